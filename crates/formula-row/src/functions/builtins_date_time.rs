use chrono::Duration;

use crate::artifact::EvalContext;
use crate::error::EvalError;
use crate::functions::{date_arg, number_arg};
use crate::functions::{IntrinsicKind, IntrinsicRegistry, NativeSignature, Volatility};
use crate::types::NativeType;
use crate::value::Value;

const NANOS_PER_DAY: f64 = 86_400_000_000_000.0;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub(super) fn register(registry: &mut IntrinsicRegistry) {
    // Number overload first: `Diff(4, 2)` must never be tried as a date pair.
    registry.define(NativeSignature {
        name: "Diff",
        params: vec![NativeType::F64, NativeType::F64],
        returns: NativeType::F64,
        volatility: Volatility::NonVolatile,
        kind: IntrinsicKind::Direct(diff_number_fn),
    });
    registry.define(NativeSignature {
        name: "Diff",
        params: vec![NativeType::DateTime, NativeType::DateTime],
        returns: NativeType::F64,
        volatility: Volatility::NonVolatile,
        kind: IntrinsicKind::Direct(diff_date_fn),
    });
    registry.define(NativeSignature {
        name: "Now",
        params: vec![],
        returns: NativeType::DateTime,
        volatility: Volatility::Volatile,
        kind: IntrinsicKind::Direct(now_fn),
    });
}

fn diff_number_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let left = number_arg("Diff", args, 0)?;
    let right = number_arg("Diff", args, 1)?;
    Ok(Value::Number(left - right))
}

/// Difference in (fractional) days.
fn diff_date_fn(_: &EvalContext, args: &[Value]) -> Result<Value, EvalError> {
    let left = date_arg("Diff", args, 0)?;
    let right = date_arg("Diff", args, 1)?;
    Ok(Value::Number(fractional_days(left.signed_duration_since(right))))
}

/// Nanosecond precision where the span fits in an `i64` of nanoseconds (about 292 years),
/// coarser units beyond that.
fn fractional_days(elapsed: Duration) -> f64 {
    if let Some(nanos) = elapsed.num_nanoseconds() {
        return nanos as f64 / NANOS_PER_DAY;
    }
    match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / MICROS_PER_DAY,
        None => elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY,
    }
}

fn now_fn(ctx: &EvalContext, _: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::Date(ctx.now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    #[test]
    fn number_diff_subtracts() {
        let args = [Value::Number(4.0), Value::Number(2.0)];
        assert_eq!(
            diff_number_fn(&EvalContext::default(), &args),
            Ok(Value::Number(2.0))
        );
    }

    #[test]
    fn date_diff_is_in_days() {
        let a = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let args = [Value::Date(a), Value::Date(b)];
        assert_eq!(
            diff_date_fn(&EvalContext::default(), &args),
            Ok(Value::Number(1.5))
        );
    }

    #[test]
    fn date_diff_keeps_sub_millisecond_precision() {
        let noon = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let later = noon + Duration::nanoseconds(1_500);
        let args = [Value::Date(later), Value::Date(midnight)];
        let Ok(Value::Number(days)) = diff_date_fn(&EvalContext::default(), &args) else {
            panic!("Diff of two dates must be a number");
        };
        assert!(days > 0.5, "{days}");
        assert!((days - (0.5 + 1_500.0 / NANOS_PER_DAY)).abs() < 1e-15, "{days}");
    }

    #[test]
    fn date_diff_spans_the_whole_calendar() {
        let args = [
            Value::Date(DateTime::<Utc>::MAX_UTC),
            Value::Date(DateTime::<Utc>::MIN_UTC),
        ];
        let Ok(Value::Number(days)) = diff_date_fn(&EvalContext::default(), &args) else {
            panic!("Diff of two dates must be a number");
        };
        // Roughly 524,000 years.
        assert!(days.is_finite() && days > 190_000_000.0, "{days}");
    }

    #[test]
    fn now_reads_the_context_clock() {
        let pinned = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(now_fn(&EvalContext::at(pinned), &[]), Ok(Value::Date(pinned)));
    }
}
