//! Hex grid constants

pub const SQRT_3: f64 = 1.732_050_807_568_877_2;

// Line-of-sight blocking weights (per sampled hex)
pub const DENSE_VEGETATION_BLOCKING: u32 = 1;
pub const STRUCTURE_BLOCKING: u32 = 2;
