//! Unit conversion and rounding for prices

use crate::types::{PricePoint, Region};
use rust_decimal::Decimal;

/// Factor converting Eur/MWh to ct/kWh (100 ct * 0.001 MWh/kWh)
pub const EUR_MWH_TO_CT_KWH: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Decimal places of a ct/kWh price
pub const CT_KWH_ROUNDING_PLACES: u32 = 2;

/// Convert a price from Eur/MWh to ct/kWh
pub fn eur_mwh_to_ct_kwh(value: Decimal) -> Decimal {
    value * EUR_MWH_TO_CT_KWH
}

/// Round a ct/kWh price to its natural precision (half-to-even)
pub fn round_ct_kwh(value: Decimal) -> Decimal {
    value.round_dp(CT_KWH_ROUNDING_PLACES)
}

/// Price a subscriber compares against their threshold, in ct/kWh.
///
/// Tax is multiplied in before rounding.
pub fn comparison_price(point: &PricePoint, region: Region, tax_opt_in: bool) -> Decimal {
    let ct = point.ct_per_kwh();
    if tax_opt_in {
        round_ct_kwh(ct * region.tax_multiplier())
    } else {
        round_ct_kwh(ct)
    }
}
