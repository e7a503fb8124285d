/// A 3D vertex of a multipatch surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Ordered boundary of one planar surface
pub type Ring = Vec<Vertex>;

/// Anything that can be broken down into 3D rings.
///
/// Rings are yielded in encounter order so the decomposition is reproducible.
pub trait RingSource {
    fn rings(&self) -> Vec<Ring>;

    fn ring_count(&self) -> usize {
        self.rings().len()
    }
}

/// ESRI multipatch surface patch
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    TriangleStrip(Vec<Vertex>),
    TriangleFan(Vec<Vertex>),
    OuterRing(Ring),
    InnerRing(Ring),
    FirstRing(Ring),
    Ring(Ring),
}

impl Patch {
    /// Rings described by this patch. Strips and fans expand to one ring per triangle.
    pub fn rings(&self) -> Vec<Ring> {
        match self {
            Patch::TriangleStrip(vertices) => vertices
                .windows(3)
                .map(|tri| vec![tri[0], tri[1], tri[2]])
                .collect(),
            Patch::TriangleFan(vertices) => match vertices.split_first() {
                Some((&apex, rest)) => rest
                    .windows(2)
                    .map(|pair| vec![apex, pair[0], pair[1]])
                    .collect(),
                None => Vec::new(),
            },
            Patch::OuterRing(ring)
            | Patch::InnerRing(ring)
            | Patch::FirstRing(ring)
            | Patch::Ring(ring) => vec![ring.clone()],
        }
    }
}

/// Multipatch geometry of a single feature
#[derive(Debug, Clone, PartialEq)]
pub enum Multipatch {
    /// Parts of rings, as found in a 3D MultiPolygon
    Parts(Vec<Vec<Ring>>),
    /// Native ESRI patch list
    Patches(Vec<Patch>),
}

impl Multipatch {
    pub fn empty() -> Self {
        Multipatch::Parts(Vec::new())
    }
}

impl RingSource for Multipatch {
    fn rings(&self) -> Vec<Ring> {
        match self {
            Multipatch::Parts(parts) => parts.iter().flatten().cloned().collect(),
            Multipatch::Patches(patches) => patches.iter().flat_map(Patch::rings).collect(),
        }
    }

    fn ring_count(&self) -> usize {
        match self {
            Multipatch::Parts(parts) => parts.iter().map(Vec::len).sum(),
            Multipatch::Patches(patches) => patches
                .iter()
                .map(|patch| match patch {
                    Patch::TriangleStrip(v) | Patch::TriangleFan(v) => v.len().saturating_sub(2),
                    _ => 1,
                })
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: f64) -> Ring {
        vec![
            Vertex::new(0.0, 0.0, z),
            Vertex::new(1.0, 0.0, z),
            Vertex::new(1.0, 1.0, z),
            Vertex::new(0.0, 1.0, z),
        ]
    }

    #[test]
    fn test_parts_flatten_in_order() {
        let mp = Multipatch::Parts(vec![vec![square(1.0), square(2.0)], vec![square(3.0)]]);
        let rings = mp.rings();
        assert_eq!(rings.len(), 3);
        assert_eq!(mp.ring_count(), 3);
        let heights: Vec<f64> = rings.iter().map(|r| r[0].z).collect();
        assert_eq!(heights, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_triangle_strip() {
        let v: Vec<Vertex> = (0..5).map(|i| Vertex::new(i as f64, 0.0, i as f64)).collect();
        let patch = Patch::TriangleStrip(v);
        let rings = patch.rings();
        assert_eq!(rings.len(), 3);
        assert_eq!(rings[1][0].x, 1.0);
        assert_eq!(rings[2][2].x, 4.0);
    }

    #[test]
    fn test_triangle_fan() {
        let v: Vec<Vertex> = (0..4).map(|i| Vertex::new(i as f64, 1.0, 0.0)).collect();
        let rings = Patch::TriangleFan(v).rings();
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|r| r[0].x == 0.0));
        assert_eq!(rings[1][2].x, 3.0);
    }

    #[test]
    fn test_short_strip_has_no_rings() {
        let mp = Multipatch::Patches(vec![
            Patch::TriangleStrip(vec![Vertex::new(0.0, 0.0, 0.0)]),
            Patch::TriangleFan(Vec::new()),
            Patch::OuterRing(square(5.0)),
        ]);
        assert_eq!(mp.rings().len(), 1);
        assert_eq!(mp.ring_count(), 1);
    }
}
