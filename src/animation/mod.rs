pub(crate) mod color;
pub(crate) mod keyframe;
pub(crate) mod point;
