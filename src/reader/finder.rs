use imageproc::{
    contours::{find_contours, BorderType, Contour},
    corners::corners_fast9,
};
use tracing::debug;

use crate::common::{GapError, GapResult};

use super::{
    binarize::BinaryImage,
    utils::geometry::{centroid, polygon_area, Point, Quad},
};

// Finder pattern locator
//------------------------------------------------------------------------------
// Three strategies, tried in order:
// 1. Nested contours: a square outer border holding a square hole that holds a square stone.
// 2. Plain square outer borders, for captures where the ring and stone bleed together.
// 3. FAST corners clustered into the four image quadrants.

const FILL_RANGE: (f64, f64) = (0.85, 1.15);
const MIN_SIDE_RATIO: f64 = 0.7;
const NEST_RATIO: (f64, f64) = (0.2, 0.8);
// Allowed drift between nested centers, as a fraction of the outer side
const CONCENTRIC_TOL: f64 = 0.15;
const MIN_QUAD_AREA: f64 = 200.0;
const AREA_SIMILARITY: f64 = 0.5;
const FAST_THRESHOLD: u8 = 40;
const KMEANS_ROUNDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Nested,
    Quads,
    Corners,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finder {
    pub quad: Quad,
    pub area: f64,
}

impl Finder {
    pub fn center(&self) -> Point {
        self.quad.center()
    }
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    quad: Option<Quad>,
    area: f64,
}

impl Shape {
    fn of(contour: &Contour<i32>) -> Self {
        let pts: Vec<Point> = contour.points.iter().map(|&p| p.into()).collect();
        let area = polygon_area(&pts);
        let quad = Quad::fit(&pts).filter(|q| is_square_like(q, area));
        Self { quad, area }
    }

    fn encloses(&self, inner: &Shape) -> bool {
        let (Some(oq), Some(iq)) = (self.quad, inner.quad) else { return false };
        if self.area <= 0.0 {
            return false;
        }
        let ratio = inner.area / self.area;
        let tol = CONCENTRIC_TOL * self.area.sqrt();
        ratio > NEST_RATIO.0 && ratio < NEST_RATIO.1 && oq.center().dist(&iq.center()) <= tol
    }
}

fn is_square_like(quad: &Quad, contour_area: f64) -> bool {
    let qa = quad.area();
    if qa <= 0.0 || !quad.is_convex() || quad.side_ratio() < MIN_SIDE_RATIO {
        return false;
    }
    let fill = contour_area / qa;
    fill >= FILL_RANGE.0 && fill <= FILL_RANGE.1
}

/// Locates the four finders, ordered top-left, top-right, bottom-left, bottom-right.
pub fn locate_finders(img: &BinaryImage, min_stone_area: f64) -> GapResult<[Finder; 4]> {
    let contours = find_contours::<i32>(&img.mask);
    let shapes: Vec<Shape> = contours.iter().map(Shape::of).collect();
    let mut children = vec![Vec::new(); contours.len()];
    for (i, c) in contours.iter().enumerate() {
        if let Some(p) = c.parent {
            children[p].push(i);
        }
    }
    debug!("Traced {} contours at threshold {}", contours.len(), img.threshold);

    let nested = nested_candidates(&contours, &shapes, &children, min_stone_area);
    let (found, strategy) = match select_four(nested) {
        Some(f) => (Some(f), Strategy::Nested),
        None => match select_four(quad_candidates(&contours, &shapes)) {
            Some(f) => (Some(f), Strategy::Quads),
            None => (corner_candidates(img), Strategy::Corners),
        },
    };

    let finders = found.ok_or(GapError::FinderPatternNotFound)?;
    debug!("Located finders with {strategy:?} strategy");
    Ok(order(finders))
}

fn nested_candidates(
    contours: &[Contour<i32>],
    shapes: &[Shape],
    children: &[Vec<usize>],
    min_stone_area: f64,
) -> Vec<Finder> {
    let is_stone = |j: usize, k: usize| {
        contours[k].border_type == BorderType::Outer
            && children[k].is_empty()
            && shapes[k].area >= min_stone_area
            && shapes[j].encloses(&shapes[k])
    };
    let is_hole = |i: usize, j: usize| {
        contours[j].border_type == BorderType::Hole
            && shapes[i].encloses(&shapes[j])
            && children[j].iter().any(|&k| is_stone(j, k))
    };

    contours
        .iter()
        .enumerate()
        .filter(|(_, c)| c.border_type == BorderType::Outer)
        .filter_map(|(i, _)| {
            let quad = shapes[i].quad?;
            children[i]
                .iter()
                .any(|&j| is_hole(i, j))
                .then_some(Finder { quad, area: shapes[i].area })
        })
        .collect()
}

fn quad_candidates(contours: &[Contour<i32>], shapes: &[Shape]) -> Vec<Finder> {
    contours
        .iter()
        .zip(shapes)
        .filter(|(c, s)| c.border_type == BorderType::Outer && s.area >= MIN_QUAD_AREA)
        .filter_map(|(_, s)| s.quad.map(|quad| Finder { quad, area: s.area }))
        .collect()
}

// Largest run of four candidates with comparable areas. Oversized blobs from dense dark data
// fall out because nothing else matches their size.
fn select_four(mut cands: Vec<Finder>) -> Option<[Finder; 4]> {
    cands.sort_by(|a, b| b.area.total_cmp(&a.area));
    if cands.len() == 4 {
        return Some([cands[0], cands[1], cands[2], cands[3]]);
    }
    cands
        .windows(4)
        .find(|w| w[0].area > 0.0 && w[3].area / w[0].area >= AREA_SIMILARITY)
        .map(|w| [w[0], w[1], w[2], w[3]])
}

fn corner_candidates(img: &BinaryImage) -> Option<[Finder; 4]> {
    let pts: Vec<Point> = corners_fast9(&img.gray, FAST_THRESHOLD)
        .iter()
        .map(|c| Point::new(c.x as f64, c.y as f64))
        .collect();
    if pts.len() < 4 {
        return None;
    }
    debug!("Clustering {} corners", pts.len());

    let (w, h) = (img.width() as f64, img.height() as f64);
    let mut centers = [
        Point::new(w * 0.25, h * 0.25),
        Point::new(w * 0.75, h * 0.25),
        Point::new(w * 0.25, h * 0.75),
        Point::new(w * 0.75, h * 0.75),
    ];
    let mut labels = vec![0usize; pts.len()];
    for _ in 0..KMEANS_ROUNDS {
        for (p, l) in pts.iter().zip(labels.iter_mut()) {
            *l = nearest(&centers, p);
        }
        for (q, center) in centers.iter_mut().enumerate() {
            let members: Vec<Point> =
                pts.iter().zip(&labels).filter(|(_, &l)| l == q).map(|(p, _)| *p).collect();
            if !members.is_empty() {
                *center = centroid(&members);
            }
        }
    }

    // Outermost corner of each cluster, toward its image corner
    let dirs = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];
    let mut found = [Finder { quad: Quad([Point::default(); 4]), area: 0.0 }; 4];
    for (q, (sx, sy)) in dirs.iter().enumerate() {
        let reach = |p: &Point| sx * p.x + sy * p.y;
        let best = pts
            .iter()
            .zip(&labels)
            .filter(|(_, &l)| l == q)
            .map(|(p, _)| *p)
            .max_by(|a, b| reach(a).total_cmp(&reach(b)))?;
        found[q] = Finder { quad: Quad([best; 4]), area: 0.0 };
    }

    let hull = Quad([found[0].center(), found[1].center(), found[3].center(), found[2].center()]);
    if !hull.is_convex() || hull.area() < 0.01 * w * h {
        return None;
    }
    Some(found)
}

fn nearest(centers: &[Point; 4], p: &Point) -> usize {
    (0..4).min_by(|&a, &b| centers[a].dist_sq(p).total_cmp(&centers[b].dist_sq(p))).unwrap_or(0)
}

fn order(mut finders: [Finder; 4]) -> [Finder; 4] {
    finders.sort_by(|a, b| a.center().y.total_cmp(&b.center().y));
    finders[..2].sort_by(|a, b| a.center().x.total_cmp(&b.center().x));
    finders[2..].sort_by(|a, b| a.center().x.total_cmp(&b.center().x));
    finders
}

/// Outer corner of each finder in continuous image coordinates. Contour vertices are pixel
/// indices, so each is pushed half a pixel outward to the pixel edge.
pub fn outer_corners(finders: &[Finder; 4]) -> [(f64, f64); 4] {
    let mid = centroid(&finders.map(|f| f.center()));
    finders.map(|f| {
        let v = f.quad.farthest_from(&mid);
        let shift = |p: f64, m: f64| p + 0.5 + if p < m { -0.5 } else { 0.5 };
        (shift(v.x, mid.x), shift(v.y, mid.y))
    })
}
