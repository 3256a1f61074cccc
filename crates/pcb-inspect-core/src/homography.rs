use crate::RasterImage;
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// Projective transform `dst ~ H * src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let (x, y) = self.apply_f64(p.x as f64, p.y as f64);
        Point2::new(x as f32, y as f32)
    }

    /// Map `(x, y)`; returns NaN coordinates for points on the line at infinity.
    #[inline]
    pub fn apply_f64(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.h * Vector3::new(x, y, 1.0);
        let w = v[2];
        if w.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        (v[0] / w, v[1] / w)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Finite entries and a non-singular matrix.
    pub fn is_usable(&self) -> bool {
        self.h.iter().all(|v| v.is_finite()) && self.h.determinant().abs() > 1e-12
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn centroid_and_spread<'a>(pts: impl Iterator<Item = &'a Point2<f32>> + Clone) -> (f64, f64, f64) {
    let mut n = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts.clone() {
        cx += p.x as f64;
        cy += p.y as f64;
        n += 1.0;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p.x as f64 - cx;
        let dy = p.y as f64 - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    (cx, cy, mean_dist / n)
}

// Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
fn normalize_points(pts: &[Point2<f32>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let (cx, cy, mean_dist) = centroid_and_spread(pts.iter());
    let t = hartley_normalization(cx, cy, mean_dist);

    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_points4(pts: &[Point2<f32>; 4]) -> ([Point2<f64>; 4], Matrix3<f64>) {
    let (cx, cy, mean_dist) = centroid_and_spread(pts.iter());
    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = [Point2::new(0.0_f64, 0.0_f64); 4];
    for (i, p) in pts.iter().enumerate() {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out[i] = Point2::new(v[0], v[1]);
    }

    (out, t)
}

// Points are Hartley-normalized, so a fixed area tolerance is scale-free.
fn has_collinear_triple(pts: &[Point2<f64>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[i, j, k]| {
        let (a, b, c) = (pts[i], pts[j], pts[k]);
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        cross.abs() < 1e-6
    })
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Least-squares DLT estimate of H such that `dst ~ H * src`.
///
/// Exactly four correspondences are solved in closed form; more go through an
/// SVD of the normalized design matrix.
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    if src.len() == 4 {
        let s: &[Point2<f32>; 4] = src.try_into().ok()?;
        let d: &[Point2<f32>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (sn, ts) = normalize_points(src);
    let (dn, td) = normalize_points(dst);

    // Build A (2N x 9)
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);

    for k in 0..n {
        let x = sn[k].x;
        let y = sn[k].y;
        let u = dn[k].x;
        let v = dn[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Solve Ah = 0 -> h is right singular vector with smallest singular value
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|l, r| l.1.total_cmp(r.1))?;
    let h = vt.row(min_idx);

    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let h_den = denormalize_homography(hn, ts, td)?;
    let h_den = normalize_homography(h_den)?;

    Some(Homography::new(h_den))
}

/// Compute H such that `dst ~ H * src` from exactly four correspondences.
///
/// Returns `None` when the configuration is degenerate (e.g. three collinear points).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);
    if has_collinear_triple(&src_n) || has_collinear_triple(&dst_n) {
        return None;
    }

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;

    let out = Homography::new(h_den);
    out.is_usable().then_some(out)
}

/// Warp `src` into an `out_w × out_h` frame through `h_dst_from_src`.
///
/// Every destination pixel is pulled back through the inverse transform and
/// bilinearly sampled per channel; samples outside `src` read as zero. Pixel
/// coordinates address pixel centres, so the identity warp is an exact copy.
/// Returns `None` if the homography is not invertible.
pub fn warp_perspective(
    src: &RasterImage,
    h_dst_from_src: &Homography,
    out_w: usize,
    out_h: usize,
) -> Option<RasterImage> {
    let h_src_from_dst = h_dst_from_src.inverse()?;
    let c = src.channels();
    let (sw, sh) = (src.width() as i64, src.height() as i64);
    let raw = src.as_raw();
    let fetch = |x: i64, y: i64, ch: usize| -> f64 {
        if x < 0 || y < 0 || x >= sw || y >= sh {
            return 0.0;
        }
        raw[(y as usize * sw as usize + x as usize) * c + ch] as f64
    };

    let mut out = vec![0u8; out_w * out_h * c];
    for y in 0..out_h {
        for x in 0..out_w {
            let (sx, sy) = h_src_from_dst.apply_f64(x as f64, y as f64);
            if !sx.is_finite() || !sy.is_finite() {
                continue;
            }
            let x0 = sx.floor();
            let y0 = sy.floor();
            if x0 < -1.0 || y0 < -1.0 || x0 >= sw as f64 || y0 >= sh as f64 {
                continue;
            }
            let fx = sx - x0;
            let fy = sy - y0;
            let (x0, y0) = (x0 as i64, y0 as i64);
            let base = (y * out_w + x) * c;
            for ch in 0..c {
                let p00 = fetch(x0, y0, ch);
                let p10 = fetch(x0 + 1, y0, ch);
                let p01 = fetch(x0, y0 + 1, ch);
                let p11 = fetch(x0 + 1, y0 + 1, ch);
                let a = p00 + fx * (p10 - p00);
                let b = p01 + fx * (p11 - p01);
                out[base + ch] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    RasterImage::new(out_w, out_h, c, out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f32>, b: Point2<f32>, tol: f32) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ));
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0_f32, 0.0),
            Point2::new(50.0_f32, -20.0),
            Point2::new(320.0_f32, 200.0),
        ] {
            assert_close(inv.apply(h.apply(p)), p, 1e-3);
        }
    }

    #[test]
    fn four_point_solve_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let src = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(180.0_f32, 0.0),
            Point2::new(180.0_f32, 130.0),
            Point2::new(0.0_f32, 130.0),
        ];
        let dst = src.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&src, &dst).expect("recoverable");
        for p in [Point2::new(60.0_f32, 40.0), Point2::new(150.0, 120.0)] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn collinear_four_points_are_rejected() {
        let src = [
            Point2::new(0.0_f32, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(20.0, 20.0),
            Point2::new(30.0, 30.0),
        ];
        assert!(homography_from_4pt(&src, &src).is_none());
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let ground_truth = Homography::new(Matrix3::new(
            1.0, 0.2, 12.0, //
            -0.1, 0.9, 6.0, //
            0.0006, 0.0004, 1.0,
        ));

        let src: Vec<Point2<f32>> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Point2::new(x as f32 * 40.0, y as f32 * 50.0)))
            .collect();
        let dst: Vec<Point2<f32>> = src.iter().map(|&p| ground_truth.apply(p)).collect();

        let estimated = estimate_homography(&src, &dst).expect("estimate");
        for p in [Point2::new(60.0_f32, 40.0), Point2::new(80.0, 100.0)] {
            assert_close(estimated.apply(p), ground_truth.apply(p), 1e-3);
        }
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let src = [Point2::new(0.0_f32, 0.0); 4];
        let dst = [Point2::new(1.0_f32, 1.0); 3];
        assert!(estimate_homography(&src, &dst).is_none());
    }

    #[test]
    fn identity_warp_is_exact_copy() {
        let data: Vec<u8> = (0..5 * 4 * 3).map(|i| (i * 7 % 256) as u8).collect();
        let src = RasterImage::new(5, 4, 3, data).unwrap();
        let out = warp_perspective(&src, &Homography::identity(), 5, 4).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn translation_warp_shifts_content_and_pads_with_zero() {
        let mut src = RasterImage::filled(6, 6, &[0]).unwrap();
        src.fill_rect(1, 1, 2, 2, &[255]);
        let shift = Homography::from_array([[1.0, 0.0, 2.0], [0.0, 1.0, 1.0], [0.0, 0.0, 1.0]]);
        let out = warp_perspective(&src, &shift, 6, 6).unwrap();
        assert_eq!(out.pixel(3, 2), &[255]);
        assert_eq!(out.pixel(4, 3), &[255]);
        assert_eq!(out.pixel(1, 1), &[0]);
        assert_eq!(out.to_gray().count_nonzero(), 4);
    }

    #[test]
    fn singular_homography_cannot_warp() {
        let src = RasterImage::filled(4, 4, &[10]).unwrap();
        let flat = Homography::from_array([[1.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(warp_perspective(&src, &flat, 4, 4).is_none());
    }
}
