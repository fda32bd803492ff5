// src/preferences/price.rs - Slider position <-> price mapping
//
// The price slider is non-linear so the cheap end gets most of the travel:
//   0..=50  -> ¥0..¥100
//   50..=90 -> ¥100..¥300
//   90..=99 -> ¥300..¥1000
//   100     -> no upper limit

use std::fmt;

/// Price in whole yuan, or unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price {
    Yuan(u32),
    Unlimited,
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Yuan(y) => write!(f, "¥{y}"),
            Price::Unlimited => f.write_str("unlimited"),
        }
    }
}

pub fn position_to_price(position: u8) -> Price {
    let p = f64::from(position);
    let yuan = if p <= 50.0 {
        (p / 50.0) * 100.0
    } else if p <= 90.0 {
        100.0 + ((p - 50.0) / 40.0) * 200.0
    } else if p <= 99.0 {
        300.0 + ((p - 90.0) / 9.0) * 700.0
    } else {
        return Price::Unlimited;
    };
    Price::Yuan(yuan.round() as u32)
}

/// Inverse of [`position_to_price`], rounded to the nearest slider step.
pub fn price_to_position(price: Price) -> u8 {
    let yuan = match price {
        Price::Yuan(y) => f64::from(y),
        Price::Unlimited => return 100,
    };
    let position = if yuan <= 100.0 {
        (yuan / 100.0) * 50.0
    } else if yuan <= 300.0 {
        50.0 + ((yuan - 100.0) / 200.0) * 40.0
    } else if yuan <= 1000.0 {
        90.0 + ((yuan - 300.0) / 700.0) * 9.0
    } else {
        100.0
    };
    position.round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_boundaries() {
        assert_eq!(position_to_price(0), Price::Yuan(0));
        assert_eq!(position_to_price(25), Price::Yuan(50));
        assert_eq!(position_to_price(50), Price::Yuan(100));
        assert_eq!(position_to_price(70), Price::Yuan(200));
        assert_eq!(position_to_price(90), Price::Yuan(300));
        assert_eq!(position_to_price(99), Price::Yuan(1000));
        assert_eq!(position_to_price(100), Price::Unlimited);
    }

    #[test]
    fn test_inverse_on_boundaries() {
        for pos in [0u8, 25, 50, 70, 90, 99, 100] {
            assert_eq!(price_to_position(position_to_price(pos)), pos);
        }
        assert_eq!(price_to_position(Price::Yuan(5000)), 100);
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::Yuan(80).to_string(), "¥80");
        assert_eq!(Price::Unlimited.to_string(), "unlimited");
    }
}
