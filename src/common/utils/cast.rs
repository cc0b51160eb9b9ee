use num_traits::ToPrimitive;

// Float to integer casts which refuse values outside the target range
//------------------------------------------------------------------------------

pub fn f64_to_i32(num: f64) -> Option<i32> {
    num.floor().to_i32()
}

pub fn f64_to_u32(num: f64) -> Option<u32> {
    num.floor().to_u32()
}

#[cfg(test)]
mod cast_tests {
    use test_case::test_case;

    use super::{f64_to_i32, f64_to_u32};

    #[test_case(3.7, Some(3))]
    #[test_case(-0.5, Some(-1))]
    #[test_case(f64::NAN, None)]
    #[test_case(1e12, None)]
    fn test_f64_to_i32(num: f64, exp: Option<i32>) {
        assert_eq!(f64_to_i32(num), exp);
    }

    #[test]
    fn test_f64_to_u32_rejects_negative() {
        assert_eq!(f64_to_u32(-0.25), None);
        assert_eq!(f64_to_u32(12.9), Some(12));
    }
}
