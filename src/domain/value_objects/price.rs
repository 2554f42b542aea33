#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Price must be finite".to_string());
        }
        if value < 0.0 {
            return Err("Price must be non-negative".to_string());
        }
        Ok(Price(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(49.99);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 49.99);
    }

    #[test]
    fn test_price_new_zero() {
        let price = Price::new(0.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 0.0);
    }

    #[test]
    fn test_price_new_negative() {
        let price = Price::new(-10.0);
        assert!(price.is_err());
        assert_eq!(price.unwrap_err(), "Price must be non-negative");
    }

    #[test]
    fn test_price_new_nan() {
        assert!(Price::new(f64::NAN).is_err());
    }

    #[test]
    fn test_price_new_infinite() {
        assert!(Price::new(f64::INFINITY).is_err());
    }
}
