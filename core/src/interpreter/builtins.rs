//! The Arduino builtin surface (§11): everything a sketch can call without
//! a user `FuncDef` — pin I/O, timing, `Serial`, and the handful of pure
//! math helpers the core library provides locally.

use crate::command::{Command, PinMode};
use crate::runtime::Value;

use super::{EvalFlow, EvalResult, Interpreter};

/// Arduino's numbered digital/analog constants (§11). `A0..A5` follow the
/// common AVR boards' convention of continuing the pin numbers after the
/// last digital pin.
pub(super) fn constant(name: &str) -> Option<Value> {
    Some(match name {
        "HIGH" => Value::Int32(1),
        "LOW" => Value::Int32(0),
        "INPUT" => Value::Int32(0),
        "OUTPUT" => Value::Int32(1),
        "INPUT_PULLUP" => Value::Int32(2),
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "A0" => Value::Int32(14),
        "A1" => Value::Int32(15),
        "A2" => Value::Int32(16),
        "A3" => Value::Int32(17),
        "A4" => Value::Int32(18),
        "A5" => Value::Int32(19),
        "LED_BUILTIN" => Value::Int32(13),
        _ => return None,
    })
}

fn pin_mode_from_value(v: &Value) -> Option<PinMode> {
    match v.as_i64() {
        Some(0) => Some(PinMode::Input),
        Some(1) => Some(PinMode::Output),
        Some(2) => Some(PinMode::InputPullup),
        _ => None,
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Void)
}

/// Dispatches a bare (non-member) call to a builtin, returning `Ok(None)`
/// if `name` is not a recognized builtin so the caller can fall through to
/// a user-defined function.
pub(super) fn call_free_function(interp: &mut Interpreter, name: &str, args: &[Value]) -> EvalResult<Option<Value>> {
    let value = match name {
        "pinMode" => {
            let pin = arg(args, 0).as_i64().unwrap_or(0) as i32;
            let mode = pin_mode_from_value(&arg(args, 1)).ok_or_else(|| {
                EvalFlow::Error(crate::error::EvalError::TypeMismatch {
                    expected: "a pin mode (INPUT, OUTPUT, or INPUT_PULLUP)".to_owned(),
                    found: arg(args, 1).type_name().to_owned(),
                })
            })?;
            interp.emit(Command::PinMode { pin, mode });
            Value::Void
        }
        "digitalWrite" => {
            let pin = arg(args, 0).as_i64().unwrap_or(0) as i32;
            let value = if arg(args, 1).is_truthy() { 1 } else { 0 };
            interp.emit(Command::DigitalWrite { pin, value });
            Value::Void
        }
        "digitalRead" => {
            let pin = arg(args, 0).as_i64().unwrap_or(0) as i32;
            interp.request_value(move |request_id| Command::DigitalReadRequest { pin, request_id })?
        }
        "analogRead" => {
            let pin = arg(args, 0).as_i64().unwrap_or(0) as i32;
            interp.request_value(move |request_id| Command::AnalogReadRequest { pin, request_id })?
        }
        "millis" => interp.request_value(|request_id| Command::MillisRequest { request_id })?,
        "micros" => interp.request_value(|request_id| Command::MicrosRequest { request_id })?,
        "delay" => {
            let duration = arg(args, 0).as_i64().unwrap_or(0).max(0) as u64;
            interp.emit(Command::Delay { duration });
            Value::Void
        }
        "delayMicroseconds" => {
            let duration = arg(args, 0).as_i64().unwrap_or(0).max(0) as u64;
            interp.emit(Command::DelayMicroseconds { duration });
            Value::Void
        }
        "map" => map_value(&arg(args, 0), &arg(args, 1), &arg(args, 2), &arg(args, 3), &arg(args, 4)),
        "constrain" => constrain_value(&arg(args, 0), &arg(args, 1), &arg(args, 2)),
        "min" => min_value(&arg(args, 0), &arg(args, 1)),
        "max" => max_value(&arg(args, 0), &arg(args, 1)),
        "abs" => abs_value(&arg(args, 0)),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// `Serial.begin/print/println` happen synchronously with no host round
/// trip (§11); any other `Serial.*` call falls through to the generic
/// `LIBRARY_METHOD_REQUEST` path in `eval.rs`.
pub(super) fn call_serial_method(interp: &mut Interpreter, method: &str, args: &[Value]) -> EvalResult<Value> {
    match method {
        "begin" => {
            let baud_rate = arg(args, 0).as_i64().unwrap_or(9600).max(0) as u32;
            interp.emit(Command::SerialBegin { baud_rate });
            Ok(Value::Void)
        }
        "print" => {
            interp.emit(Command::SerialPrint {
                data: arg(args, 0).display_string(),
            });
            Ok(Value::Void)
        }
        "println" => {
            interp.emit(Command::SerialPrintln {
                data: arg(args, 0).display_string(),
            });
            Ok(Value::Void)
        }
        other => {
            let args_owned: Vec<String> = args.iter().map(Value::display_string).collect();
            let method_owned = other.to_owned();
            interp.request_value(move |request_id| Command::LibraryMethodRequest {
                object: "Serial".to_owned(),
                method: method_owned.clone(),
                args: args_owned.clone(),
                request_id,
            })
        }
    }
}

fn min_value(a: &Value, b: &Value) -> Value {
    if a.as_f64().unwrap_or(0.0) <= b.as_f64().unwrap_or(0.0) {
        a.clone()
    } else {
        b.clone()
    }
}

fn max_value(a: &Value, b: &Value) -> Value {
    if a.as_f64().unwrap_or(0.0) >= b.as_f64().unwrap_or(0.0) {
        a.clone()
    } else {
        b.clone()
    }
}

fn abs_value(v: &Value) -> Value {
    match v {
        Value::Double(d) => Value::Double(d.abs()),
        _ => Value::Int32(v.as_i64().unwrap_or(0).unsigned_abs().min(i32::MAX as u64) as i32),
    }
}

fn constrain_value(value: &Value, low: &Value, high: &Value) -> Value {
    let v = value.as_f64().unwrap_or(0.0);
    let lo = low.as_f64().unwrap_or(0.0);
    let hi = high.as_f64().unwrap_or(0.0);
    if v < lo {
        low.clone()
    } else if v > hi {
        high.clone()
    } else {
        value.clone()
    }
}

/// Arduino's `map`: linear re-scale computed in floating point, truncated
/// back to the input's integer-vs-float shape like the real core library
/// (`map()` is defined in terms of `long` arithmetic; this runtime only
/// ever sees `Value`'s handful of numeric shapes so it keeps doubles when
/// any operand is one).
fn map_value(value: &Value, in_min: &Value, in_max: &Value, out_min: &Value, out_max: &Value) -> Value {
    let v = value.as_f64().unwrap_or(0.0);
    let in_lo = in_min.as_f64().unwrap_or(0.0);
    let in_hi = in_max.as_f64().unwrap_or(0.0);
    let out_lo = out_min.as_f64().unwrap_or(0.0);
    let out_hi = out_max.as_f64().unwrap_or(0.0);
    let denom = in_hi - in_lo;
    let scaled = if denom == 0.0 {
        out_lo
    } else {
        (v - in_lo) * (out_hi - out_lo) / denom + out_lo
    };
    if matches!(value, Value::Double(_)) {
        Value::Double(scaled)
    } else {
        Value::Int32(scaled as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrain_clamps_into_range() {
        assert!(matches!(constrain_value(&Value::Int32(20), &Value::Int32(0), &Value::Int32(10)), Value::Int32(10)));
        assert!(matches!(constrain_value(&Value::Int32(-5), &Value::Int32(0), &Value::Int32(10)), Value::Int32(0)));
    }

    #[test]
    fn map_rescales_linearly() {
        let mapped = map_value(&Value::Int32(5), &Value::Int32(0), &Value::Int32(10), &Value::Int32(0), &Value::Int32(100));
        assert!(matches!(mapped, Value::Int32(50)));
    }

    #[test]
    fn abs_handles_negative_ints() {
        assert!(matches!(abs_value(&Value::Int32(-7)), Value::Int32(7)));
    }
}
