// Pipeline processing: normalization and record validation

pub mod normalize;
pub mod quality_gate;
