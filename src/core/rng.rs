// Copyright @yucwang 2026

use crate::math::constants::{ Float, Vector2f };

pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    pub fn next_f32(&mut self) -> Float {
        (self.next_u32() as Float) / (u32::MAX as Float)
    }

    pub fn next_2d(&mut self) -> Vector2f {
        Vector2f::new(self.next_f32(), self.next_f32())
    }
}

#[cfg(test)]
mod tests {
    use super::LcgRng;

    #[test]
    fn test_rng_is_deterministic_per_seed() {
        let mut a = LcgRng::new(42);
        let mut b = LcgRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }

        let mut c = LcgRng::new(43);
        let mut d = LcgRng::new(42);
        let mut diverged = false;
        for _ in 0..8 {
            if c.next_u32() != d.next_u32() {
                diverged = true;
            }
        }
        assert!(diverged);
    }

    #[test]
    fn test_rng_unit_interval() {
        let mut rng = LcgRng::new(1);
        for _ in 0..1024 {
            let v = rng.next_f32();
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
