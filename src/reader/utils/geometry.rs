// Point
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist_sq(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn dist(&self, other: &Point) -> f64 {
        self.dist_sq(other).sqrt()
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<imageproc::point::Point<i32>> for Point {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self { x: p.x as f64, y: p.y as f64 }
    }
}

// Cross product of (b - a) and (c - a). Positive when c lies to the left of a->b in image space
fn cross(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

// Polygon helpers
//------------------------------------------------------------------------------

/// Shoelace area of a closed polygon.
pub fn polygon_area(pts: &[Point]) -> f64 {
    if pts.len() < 3 {
        return 0.0;
    }
    let n = pts.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

pub fn centroid(pts: &[Point]) -> Point {
    if pts.is_empty() {
        return Point::default();
    }
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

// Quadrilateral
//------------------------------------------------------------------------------

/// Four vertices in cyclic order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Fits a quadrilateral to a closed contour: the vertex farthest from the centroid, the
    /// vertex farthest from that one, then the farthest points on either side of their diagonal.
    pub fn fit(contour: &[Point]) -> Option<Self> {
        if contour.len() < 4 {
            return None;
        }

        let c = centroid(contour);
        let p0 = *farthest(contour, |p| p.dist_sq(&c))?;
        let p2 = *farthest(contour, |p| p.dist_sq(&p0))?;
        let p1 = *farthest(contour, |p| cross(&p0, &p2, p))?;
        let p3 = *farthest(contour, |p| -cross(&p0, &p2, p))?;

        if cross(&p0, &p2, &p1) <= 0.0 || cross(&p0, &p2, &p3) >= 0.0 {
            return None;
        }
        Some(Self([p0, p1, p2, p3]))
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.0)
    }

    pub fn center(&self) -> Point {
        centroid(&self.0)
    }

    pub fn is_convex(&self) -> bool {
        let signs: Vec<f64> =
            (0..4).map(|i| cross(&self.0[i], &self.0[(i + 1) % 4], &self.0[(i + 2) % 4])).collect();
        signs.iter().all(|&s| s > 0.0) || signs.iter().all(|&s| s < 0.0)
    }

    /// Ratio of the mean lengths of the two pairs of opposite sides, at most 1.
    pub fn side_ratio(&self) -> f64 {
        let side = |i: usize| self.0[i].dist(&self.0[(i + 1) % 4]);
        let a = (side(0) + side(2)) / 2.0;
        let b = (side(1) + side(3)) / 2.0;
        if a.max(b) <= 0.0 {
            return 0.0;
        }
        a.min(b) / a.max(b)
    }

    /// Vertex farthest from `p`.
    pub fn farthest_from(&self, p: &Point) -> Point {
        self.0.iter().copied().fold(self.0[0], |best, v| {
            if v.dist_sq(p) > best.dist_sq(p) {
                v
            } else {
                best
            }
        })
    }
}

fn farthest<F: Fn(&Point) -> f64>(pts: &[Point], score: F) -> Option<&Point> {
    pts.iter().max_by(|a, b| score(a).total_cmp(&score(b)))
}
