use std::path::PathBuf;

/// Shader shipped with the demo crate.
pub const DEFAULT_SHADER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/res/shaders/basic.shader");

/// Demo settings.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub shader_path: PathBuf,
    /// Red channel change per frame.
    pub color_step: f32,
    /// Green, blue and alpha.
    pub fixed_channels: [f32; 3],
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            shader_path: PathBuf::from(DEFAULT_SHADER),
            color_step: 0.05,
            fixed_channels: [0.3, 0.8, 1.0],
        }
    }
}

impl DemoConfig {
    /// Defaults, with the shader path taken from the first CLI argument if given.
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = args.next() {
            config.shader_path = PathBuf::from(path);
        }
        config
    }
}
