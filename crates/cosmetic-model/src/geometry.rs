//! Render-ready cube geometry
//!
//! Content coordinates are Y-up with the feet at zero. Model space flips Y
//! so that it points down with the neck at zero, which is the
//! space avatar poses are expressed in. Reflecting the Y axis turns a
//! rotation `(x, y, z)` into `(-x, y, -z)`.

use glam::{Vec2, Vec3};

/// Height of the avatar in pixels; content Y is measured up from the feet
pub const MODEL_HEIGHT: f32 = 24.0;

/// Convert a point from content space to model space
pub fn to_model_point(point: Vec3) -> Vec3 {
    Vec3::new(point.x, MODEL_HEIGHT - point.y, point.z)
}

/// Convert an offset (a difference of points) from content space to model space
pub fn to_model_offset(offset: Vec3) -> Vec3 {
    Vec3::new(offset.x, -offset.y, offset.z)
}

/// Convert Euler angles in degrees from content space to model space radians
pub fn to_model_rotation(degrees: Vec3) -> Vec3 {
    Vec3::new(
        -degrees.x.to_radians(),
        degrees.y.to_radians(),
        -degrees.z.to_radians(),
    )
}

/// Direction a face points in, named after content space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceDirection {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl FaceDirection {
    pub const ALL: [FaceDirection; 6] = [
        FaceDirection::North,
        FaceDirection::East,
        FaceDirection::South,
        FaceDirection::West,
        FaceDirection::Up,
        FaceDirection::Down,
    ];

    /// Outward normal in model space
    pub fn model_normal(self) -> Vec3 {
        match self {
            FaceDirection::North => Vec3::NEG_Z,
            FaceDirection::South => Vec3::Z,
            FaceDirection::East => Vec3::X,
            FaceDirection::West => Vec3::NEG_X,
            FaceDirection::Up => Vec3::NEG_Y,
            FaceDirection::Down => Vec3::Y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Model space, pixels
    pub position: Vec3,
    /// Normalized texture coordinate
    pub uv: Vec2,
}

/// A quad with a normal computed from its winding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Corners in winding order
    pub vertices: [Vertex; 4],
    /// Unit normal from the winding, zero for a degenerate face
    pub normal: Vec3,
    /// Which side of the cube the face came from
    pub direction: FaceDirection,
}

impl Face {
    pub fn new(vertices: [Vertex; 4], direction: FaceDirection) -> Self {
        let a = vertices[0].position;
        let b = vertices[1].position;
        let c = vertices[2].position;
        let normal = (b - a).cross(c - a).normalize_or_zero();
        Self {
            vertices,
            normal,
            direction,
        }
    }

    /// The same quad seen from the other side
    pub fn flipped(&self) -> Self {
        let [a, b, c, d] = self.vertices;
        Self {
            vertices: [d, c, b, a],
            normal: -self.normal,
            direction: self.direction,
        }
    }

    /// Whether the face has zero area
    pub fn is_degenerate(&self) -> bool {
        self.normal == Vec3::ZERO
    }
}

/// Texture rectangle in pixels, `min` at the top-left of the face as seen from outside
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    /// Top-left corner
    pub min: Vec2,
    /// Bottom-right corner, may be left of or above `min` when flipped
    pub max: Vec2,
}

impl UvRect {
    pub fn new(min: Vec2, size: Vec2) -> Self {
        Self {
            min,
            max: min + size,
        }
    }

    fn mirrored(self) -> Self {
        Self {
            min: Vec2::new(self.max.x, self.min.y),
            max: Vec2::new(self.min.x, self.max.y),
        }
    }
}

/// How a cube's faces are mapped onto the texture
#[derive(Debug, Clone, PartialEq)]
pub enum CubeUv {
    /// All six faces unfolded from one anchor
    Box(Vec2),
    /// Explicit rectangles in [`FaceDirection::ALL`] order; `None` omits the face
    PerFace([Option<UvRect>; 6]),
}

/// Parameters a cube is built from, in content space
#[derive(Debug, Clone, PartialEq)]
pub struct CubeParams {
    /// Lowest corner before inflation
    pub origin: Vec3,
    /// Extent along each axis
    pub size: Vec3,
    /// Grows the box on every side without moving its UVs
    pub inflate: f32,
    /// Mirror the box UV layout left to right
    pub mirror: bool,
    /// Box or per-face texture mapping
    pub uv: CubeUv,
    /// Texture size in pixels, for normalizing UVs
    pub texture_size: Vec2,
}

/// Box UV layout: the six face rectangles derived from a single anchor.
///
/// ```text
///          d     w     w
///       +-----+-----+-----+
///    d  |     | up  |down |
///       +-----+-----+-----+-----+
///    h  |east |north|west |south|
///       +-----+-----+-----+-----+
///          d     w     d     w
/// ```
pub fn box_uv_rects(anchor: Vec2, size: Vec3, mirror: bool) -> [UvRect; 6] {
    let (w, h, d) = (size.x.abs(), size.y.abs(), size.z.abs());
    let at = |du: f32, dv: f32, su: f32, sv: f32| {
        UvRect::new(anchor + Vec2::new(du, dv), Vec2::new(su, sv))
    };

    let north = at(d, d, w, h);
    let south = at(d + w + d, d, w, h);
    let mut east = at(0.0, d, d, h);
    let mut west = at(d + w, d, d, h);
    let up = at(d, 0.0, w, d);
    // The bottom face is stored upside down
    let down = UvRect {
        min: anchor + Vec2::new(d + w, d),
        max: anchor + Vec2::new(d + w + w, 0.0),
    };

    let mut rects = [north, east, south, west, up, down];
    if mirror {
        std::mem::swap(&mut east, &mut west);
        rects = [north, east, south, west, up, down].map(UvRect::mirrored);
    }
    rects
}

/// An axis-aligned box with outward and inward faces
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    /// Model space corners after inflation
    pub min: Vec3,
    /// Opposite corner of `min`
    pub max: Vec3,
    faces: Vec<Face>,
    outward: usize,
}

impl Cube {
    pub fn new(params: &CubeParams) -> Self {
        let inflate = Vec3::splat(params.inflate);
        let low = params.origin - inflate;
        let high = params.origin + params.size + inflate;
        // Y flips, so the content top becomes the model minimum
        let min = Vec3::new(low.x, MODEL_HEIGHT - high.y, low.z);
        let max = Vec3::new(high.x, MODEL_HEIGHT - low.y, high.z);

        let rects: [Option<UvRect>; 6] = match &params.uv {
            CubeUv::Box(anchor) => box_uv_rects(*anchor, params.size, params.mirror).map(Some),
            CubeUv::PerFace(rects) => *rects,
        };

        let texture = params.texture_size.max(Vec2::ONE);
        let mut faces = Vec::with_capacity(12);
        for (direction, rect) in FaceDirection::ALL.into_iter().zip(rects) {
            if let Some(rect) = rect {
                faces.push(build_face(direction, min, max, rect, texture));
            }
        }

        let outward = faces.len();
        let inward: Vec<Face> = faces.iter().map(Face::flipped).collect();
        faces.extend(inward);

        Self {
            min,
            max,
            faces,
            outward,
        }
    }

    /// All faces, outward first
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn outward_faces(&self) -> &[Face] {
        &self.faces[..self.outward]
    }

    pub fn inward_faces(&self) -> &[Face] {
        &self.faces[self.outward..]
    }
}

/// Corners ordered top-left, top-right, bottom-right, bottom-left as seen
/// from outside, which winds the normal outward.
fn build_face(direction: FaceDirection, min: Vec3, max: Vec3, rect: UvRect, texture: Vec2) -> Face {
    let (x0, y0, z0) = (min.x, min.y, min.z);
    let (x1, y1, z1) = (max.x, max.y, max.z);

    let corners = match direction {
        FaceDirection::North => [
            Vec3::new(x1, y0, z0),
            Vec3::new(x0, y0, z0),
            Vec3::new(x0, y1, z0),
            Vec3::new(x1, y1, z0),
        ],
        FaceDirection::South => [
            Vec3::new(x0, y0, z1),
            Vec3::new(x1, y0, z1),
            Vec3::new(x1, y1, z1),
            Vec3::new(x0, y1, z1),
        ],
        FaceDirection::East => [
            Vec3::new(x1, y0, z1),
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x1, y1, z1),
        ],
        FaceDirection::West => [
            Vec3::new(x0, y0, z0),
            Vec3::new(x0, y0, z1),
            Vec3::new(x0, y1, z1),
            Vec3::new(x0, y1, z0),
        ],
        FaceDirection::Up => [
            Vec3::new(x0, y0, z0),
            Vec3::new(x1, y0, z0),
            Vec3::new(x1, y0, z1),
            Vec3::new(x0, y0, z1),
        ],
        FaceDirection::Down => [
            Vec3::new(x0, y1, z1),
            Vec3::new(x1, y1, z1),
            Vec3::new(x1, y1, z0),
            Vec3::new(x0, y1, z0),
        ],
    };

    let uvs = [
        Vec2::new(rect.min.x, rect.min.y),
        Vec2::new(rect.max.x, rect.min.y),
        Vec2::new(rect.max.x, rect.max.y),
        Vec2::new(rect.min.x, rect.max.y),
    ];

    let vertices = [0, 1, 2, 3].map(|i| Vertex {
        position: corners[i],
        uv: uvs[i] / texture,
    });
    Face::new(vertices, direction)
}
