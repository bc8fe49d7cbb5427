// Copyright @yucwang 2026

use super::constants::{ Float, Vector2f };

/// Piecewise-constant 2-D importance table. Rows are selected through a
/// marginal CDF, columns through per-row conditional CDFs. `sample` and
/// `pdf` form a generator/density pair over the unit square.
pub struct Distribution2D {
    width: usize,
    height: usize,
    row_cdf: Vec<Float>,
    col_cdf: Vec<Float>,
    total_weight: Float,
}

impl Distribution2D {
    pub fn new(weights: &[Float], width: usize, height: usize) -> Self {
        debug_assert_eq!(weights.len(), width * height);

        let mut row_cdf = vec![0.0; height + 1];
        let mut col_cdf = vec![0.0; height * (width + 1)];
        let mut total = 0.0;

        for y in 0..height {
            let mut row_sum = 0.0;
            for x in 0..width {
                row_sum += weights[y * width + x].max(0.0);
                col_cdf[y * (width + 1) + x + 1] = row_sum;
            }
            total += row_sum;
            row_cdf[y + 1] = total;
        }

        Self { width, height, row_cdf, col_cdf, total_weight: total }
    }

    pub fn is_degenerate(&self) -> bool {
        self.total_weight <= 0.0
    }

    /// Draw a cell-continuous point in the unit square. Returns the point
    /// and the joint density over the square, or None when the table holds
    /// no weight.
    pub fn sample(&self, u: &Vector2f) -> Option<(Vector2f, Float)> {
        if self.is_degenerate() {
            return None;
        }

        let target_row = u.x * self.total_weight;
        let y = upper_cell(&self.row_cdf, target_row);
        let row_weight = self.row_cdf[y + 1] - self.row_cdf[y];
        if row_weight <= 0.0 {
            return None;
        }

        let row = &self.col_cdf[y * (self.width + 1)..(y + 1) * (self.width + 1)];
        let target_col = u.y * row_weight;
        let x = upper_cell(row, target_col);
        let cell_weight = row[x + 1] - row[x];
        if cell_weight <= 0.0 {
            return None;
        }

        // Re-stretch the random offsets inside the chosen cell.
        let dy = ((target_row - self.row_cdf[y]) / row_weight).min(0.999999);
        let dx = ((target_col - row[x]) / cell_weight).min(0.999999);

        let point = Vector2f::new((x as Float + dx) / self.width as Float,
                                  (y as Float + dy) / self.height as Float);
        Some((point, self.pdf_cell(x, y)))
    }

    /// Joint density at a point of the unit square, in the same measure
    /// `sample` reports.
    pub fn pdf(&self, point: &Vector2f) -> Float {
        if self.is_degenerate() {
            return 0.0;
        }
        let x = ((point.x * self.width as Float) as usize).min(self.width - 1);
        let y = ((point.y * self.height as Float) as usize).min(self.height - 1);
        self.pdf_cell(x, y)
    }

    fn pdf_cell(&self, x: usize, y: usize) -> Float {
        let row = &self.col_cdf[y * (self.width + 1)..(y + 1) * (self.width + 1)];
        let cell_weight = row[x + 1] - row[x];
        let cell_area = 1.0 / (self.width as Float * self.height as Float);
        (cell_weight / self.total_weight) / cell_area
    }
}

fn upper_cell(cdf: &[Float], target: Float) -> usize {
    // Smallest cell index whose upper CDF bound reaches the target.
    let mut lo = 0usize;
    let mut hi = cdf.len() - 2;
    while lo < hi {
        let mid = (lo + hi) / 2;
        if cdf[mid + 1] < target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::LcgRng;

    #[test]
    fn test_distribution_prefers_heavy_cells() {
        // One bright cell in a 4x4 table should receive most samples.
        let mut weights = vec![0.1; 16];
        weights[2 * 4 + 1] = 100.0;
        let dist = Distribution2D::new(&weights, 4, 4);

        let mut rng = LcgRng::new(3);
        let mut bright = 0;
        let n = 4000;
        for _ in 0..n {
            let u = Vector2f::new(rng.next_f32(), rng.next_f32());
            let (p, pdf) = dist.sample(&u).expect("non-degenerate table");
            assert!(pdf > 0.0);
            let x = (p.x * 4.0) as usize;
            let y = (p.y * 4.0) as usize;
            if x == 1 && y == 2 {
                bright += 1;
            }
        }
        assert!(bright as f32 / n as f32 > 0.9);
    }

    #[test]
    fn test_distribution_pdf_matches_sample() {
        let weights = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let dist = Distribution2D::new(&weights, 3, 2);
        let mut rng = LcgRng::new(17);
        for _ in 0..512 {
            let u = Vector2f::new(rng.next_f32(), rng.next_f32());
            let (p, pdf) = dist.sample(&u).unwrap();
            assert!((dist.pdf(&p) - pdf).abs() < 1e-3 * pdf.max(1.0));
        }
    }

    #[test]
    fn test_distribution_normalization() {
        // Average pdf over the unit square integrates to one.
        let weights = [0.0, 1.0, 4.0, 2.0, 0.5, 0.25, 8.0, 1.0, 1.0];
        let dist = Distribution2D::new(&weights, 3, 3);
        let mut rng = LcgRng::new(29);
        let mut sum = 0.0;
        let n = 50000;
        for _ in 0..n {
            let p = Vector2f::new(rng.next_f32(), rng.next_f32());
            sum += dist.pdf(&p);
        }
        let integral = sum / n as Float;
        assert!((integral - 1.0).abs() < 0.02, "integral = {}", integral);
    }

    #[test]
    fn test_degenerate_distribution_declines() {
        let dist = Distribution2D::new(&[0.0; 4], 2, 2);
        assert!(dist.is_degenerate());
        assert!(dist.sample(&Vector2f::new(0.5, 0.5)).is_none());
        assert_eq!(dist.pdf(&Vector2f::new(0.5, 0.5)), 0.0);
    }
}
