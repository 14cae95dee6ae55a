use crate::types::MarbleId;

/// One element of the sampled field. Position, size, and color are fixed at
/// creation. `consumed` flips false to true at most once; `parent` is
/// assigned at that same moment and never changes afterwards. `None` marks
/// both an untouched marble and a seeded root; `consumed` disambiguates.
#[derive(Clone, Debug, PartialEq)]
pub struct Marble {
    pub id: MarbleId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub consumed: bool,
    pub parent: Option<MarbleId>,
}
