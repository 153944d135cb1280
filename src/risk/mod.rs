/// Position sizing capability.
///
/// Entry size is decided outside the reconciliation engine; the cycle only
/// asks for a quantity when it is flat and wants to arm a breakout buy.
/// Exits always use the full held quantity and never consult the sizer.
pub trait PositionSizer: Send + Sync {
    fn size_position(&self) -> f64;
}

/// Constant entry size from configuration
#[derive(Debug, Clone)]
pub struct FixedQuantitySizer {
    pub quantity: f64,
}

impl FixedQuantitySizer {
    pub fn new(quantity: f64) -> Self {
        Self { quantity }
    }
}

impl PositionSizer for FixedQuantitySizer {
    fn size_position(&self) -> f64 {
        self.quantity
    }
}
