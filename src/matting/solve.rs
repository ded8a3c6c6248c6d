use nalgebra::{SMatrix, SVector};

/// Backdrop colours per pixel system.
pub const BACKDROPS: usize = 5;

/// Rows of one pixel system: one per channel per backdrop.
const ROWS: usize = BACKDROPS * 3;

/// Pivots smaller than this make the triangular solve unreliable.
const PIVOT_EPSILON: f64 = 1e-12;

type System = SMatrix<f64, ROWS, 4>;
type Rhs = SVector<f64, ROWS>;

/// Least-squares estimate for one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelEstimate {
    pub alpha: f64,
    /// Foreground premultiplied by alpha, per channel.
    pub premultiplied: [f64; 3],
}

impl PixelEstimate {
    /// Unpremultiplied foreground colour; black where alpha is within `epsilon` of zero.
    pub fn foreground(&self, epsilon: f64) -> [f64; 3] {
        if self.alpha.abs() < epsilon {
            return [0.0; 3];
        }
        self.premultiplied.map(|g| g / self.alpha)
    }
}

/// Solve `observed_k = g + (1 - alpha) * backdrop_k` for every backdrop `k`.
///
/// Rearranged per channel `c` as
/// `-backdrop_k[c] * alpha + g[c] = observed_k[c] - backdrop_k[c]`, giving
/// fifteen equations in the four unknowns `(alpha, g_r, g_g, g_b)`.
pub fn solve_pixel(
    observed: &[[f32; 3]; BACKDROPS],
    backdrops: &[[f32; 3]; BACKDROPS],
) -> PixelEstimate {
    let mut a = System::zeros();
    let mut b = Rhs::zeros();
    for k in 0..BACKDROPS {
        for c in 0..3 {
            let row = k * 3 + c;
            let backdrop = backdrops[k][c] as f64;
            a[(row, 0)] = -backdrop;
            a[(row, 1 + c)] = 1.0;
            b[row] = observed[k][c] as f64 - backdrop;
        }
    }

    let x = least_squares(&a, &b);
    PixelEstimate {
        alpha: x[0],
        premultiplied: [x[1], x[2], x[3]],
    }
}

fn least_squares(a: &System, b: &Rhs) -> SVector<f64, 4> {
    let qr = a.qr();
    let r = qr.r();
    if r.diagonal().iter().all(|d| d.abs() > PIVOT_EPSILON) {
        let qtb = qr.q().transpose() * b;
        if let Some(x) = r.solve_upper_triangular(&qtb) {
            return x;
        }
    }

    // Rank deficient, e.g. every backdrop the same colour at this pixel.
    a.svd(true, true)
        .solve(b, PIVOT_EPSILON)
        .unwrap_or_else(|_| SVector::zeros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BACKDROPS_RGBCKY: [[f32; 3]; BACKDROPS] = [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
    ];

    fn composite(alpha: f32, fg: [f32; 3]) -> [[f32; 3]; BACKDROPS] {
        BACKDROPS_RGBCKY.map(|bk| [0, 1, 2].map(|c| alpha * fg[c] + (1.0 - alpha) * bk[c]))
    }

    #[test]
    fn opaque_pixel_recovers_its_colour() {
        let fg = [0.2, 0.6, 0.9];
        let estimate = solve_pixel(&composite(1.0, fg), &BACKDROPS_RGBCKY);
        assert_relative_eq!(estimate.alpha, 1.0, epsilon = 1e-5);
        let recovered = estimate.foreground(1e-6);
        for c in 0..3 {
            assert_relative_eq!(recovered[c], fg[c] as f64, epsilon = 1e-5);
        }
    }

    #[test]
    fn unchanged_backdrop_means_transparent() {
        let estimate = solve_pixel(&BACKDROPS_RGBCKY, &BACKDROPS_RGBCKY);
        assert_relative_eq!(estimate.alpha, 0.0, epsilon = 1e-9);
        for g in estimate.premultiplied {
            assert_relative_eq!(g, 0.0, epsilon = 1e-9);
        }
        assert_eq!(estimate.foreground(1e-6), [0.0; 3]);
    }

    #[test]
    fn partial_coverage_splits_colour_and_alpha() {
        let fg = [0.8, 0.4, 0.1];
        let estimate = solve_pixel(&composite(0.4, fg), &BACKDROPS_RGBCKY);
        assert_relative_eq!(estimate.alpha, 0.4, epsilon = 1e-5);
        assert_relative_eq!(estimate.premultiplied[0], 0.32, epsilon = 1e-5);
        assert_relative_eq!(estimate.foreground(1e-6)[1], 0.4, epsilon = 1e-4);
    }

    #[test]
    fn identical_backdrops_fall_back_without_panicking() {
        let grey = [[0.5f32; 3]; BACKDROPS];
        let estimate = solve_pixel(&grey, &grey);
        assert!(estimate.alpha.is_finite());
        assert!(estimate.premultiplied.iter().all(|g| g.is_finite()));
    }
}
