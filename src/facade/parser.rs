use super::Request;
use crate::{
    config::DEFAULT_TAP_MS,
    error::Malformed,
    types::{ActionId, Binding, Direction},
};

const PREFIX: &[u8] = b"RSR";

/// Parses `RSR <COMMAND> [args...]`. Keywords are case-insensitive.
///
/// ```text
/// RSR SET CW|CCW <sensor> <layer> <action> <param1> <param2> [tap_ms] [DEFER]
/// RSR GETALL <sensor>
/// RSR SENSORS
/// RSR PENDING
/// RSR SAVE
/// ```
///
/// Sensor and layer are range-checked by the service, not here. A missing
/// `tap_ms` falls back to the configured default tap.
pub fn parse_request(line: &[u8]) -> Result<Request, Malformed> {
    let mut tokens = line
        .split(u8::is_ascii_whitespace)
        .filter(|token| !token.is_empty());

    if !tokens
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case(PREFIX))
    {
        return Err(Malformed::UnknownCommand);
    }
    let command = tokens.next().ok_or(Malformed::UnknownCommand)?;

    let request = if command.eq_ignore_ascii_case(b"SET") {
        parse_set(&mut tokens)?
    } else if command.eq_ignore_ascii_case(b"GETALL") {
        Request::GetAllLayerBindings {
            sensor: parse_u32(tokens.next())?,
        }
    } else if command.eq_ignore_ascii_case(b"SENSORS") {
        Request::GetSensors
    } else if command.eq_ignore_ascii_case(b"PENDING") {
        Request::HasPendingChanges
    } else if command.eq_ignore_ascii_case(b"SAVE") {
        Request::SavePendingChanges
    } else {
        return Err(Malformed::UnknownCommand);
    };

    if tokens.next().is_some() {
        return Err(Malformed::TrailingInput);
    }
    Ok(request)
}

fn parse_set<'a>(tokens: &mut impl Iterator<Item = &'a [u8]>) -> Result<Request, Malformed> {
    let direction = parse_direction(tokens.next())?;
    let sensor = parse_u32(tokens.next())?;
    let layer = parse_u32(tokens.next())?;
    let action = parse_u32(tokens.next())?;
    let action = u16::try_from(action).map_err(|_| Malformed::InvalidNumber)?;
    let param1 = parse_u32(tokens.next())?;
    let param2 = parse_u32(tokens.next())?;

    let mut next = tokens.next();
    let tap_ms = match next {
        Some(token) if !is_defer(token) => {
            next = tokens.next();
            parse_u32(Some(token))?
        }
        _ => DEFAULT_TAP_MS,
    };
    let skip_save = match next {
        None => false,
        Some(flag) if is_defer(flag) => true,
        Some(_) => return Err(Malformed::TrailingInput),
    };

    Ok(Request::SetBinding {
        sensor,
        layer,
        direction,
        binding: Binding {
            action: ActionId(action),
            param1,
            param2,
            tap_ms,
        },
        skip_save,
    })
}

fn parse_direction(token: Option<&[u8]>) -> Result<Direction, Malformed> {
    let token = token.ok_or(Malformed::MissingArgument)?;
    if token.eq_ignore_ascii_case(b"CW") {
        Ok(Direction::Cw)
    } else if token.eq_ignore_ascii_case(b"CCW") {
        Ok(Direction::Ccw)
    } else {
        Err(Malformed::InvalidDirection)
    }
}

fn is_defer(token: &[u8]) -> bool {
    token.eq_ignore_ascii_case(b"DEFER")
}

/// Decimal, or hex with a `0x` prefix.
fn parse_u32(token: Option<&[u8]>) -> Result<u32, Malformed> {
    let token = token.ok_or(Malformed::MissingArgument)?;
    let (digits, radix) = match token {
        [b'0', b'x' | b'X', rest @ ..] => (rest, 16),
        _ => (token, 10),
    };
    if digits.is_empty() {
        return Err(Malformed::InvalidNumber);
    }

    let mut value = 0u32;
    for &byte in digits {
        let digit = char::from(byte)
            .to_digit(radix)
            .ok_or(Malformed::InvalidNumber)?;
        value = value
            .checked_mul(radix)
            .and_then(|value| value.checked_add(digit))
            .ok_or(Malformed::InvalidNumber)?;
    }
    Ok(value)
}
