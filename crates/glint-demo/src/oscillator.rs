/// Red channel that sweeps back and forth between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorOscillator {
    red: f32,
    step: f32,
    fixed: [f32; 3],
}

impl ColorOscillator {
    pub fn new(step: f32, fixed: [f32; 3]) -> Self {
        Self {
            red: 0.0,
            step: step.abs(),
            fixed,
        }
    }

    /// Current RGBA value, red clamped to `[0, 1]`.
    pub fn color(&self) -> [f32; 4] {
        let [g, b, a] = self.fixed;
        [self.red.clamp(0.0, 1.0), g, b, a]
    }

    /// Advances one frame, reversing at either end.
    pub fn advance(&mut self) {
        if self.red > 1.0 {
            self.step = -self.step.abs();
        } else if self.red < 0.0 {
            self.step = self.step.abs();
        }
        self.red += self.step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_dark_with_fixed_channels() {
        let osc = ColorOscillator::new(0.05, [0.3, 0.8, 1.0]);
        assert_eq!(osc.color(), [0.0, 0.3, 0.8, 1.0]);
    }

    #[test]
    fn stays_in_unit_range_and_turns_around() {
        let mut osc = ColorOscillator::new(0.05, [0.3, 0.8, 1.0]);
        let mut peaked = false;
        let mut prev = osc.color()[0];

        for _ in 0..200 {
            osc.advance();
            let red = osc.color()[0];
            assert!((0.0..=1.0).contains(&red), "red out of range: {red}");
            if red < prev {
                peaked = true;
            }
            prev = red;
        }
        assert!(peaked);
    }

    #[test]
    fn negative_step_still_rises_first() {
        let mut osc = ColorOscillator::new(-0.1, [0.0; 3]);
        osc.advance();
        assert!(osc.color()[0] > 0.0);
    }
}
