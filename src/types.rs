use crate::{
    config::{MAX_LAYERS, MAX_SENSORS},
    error::{IndexKind, OutOfRange},
};

pub const BINDING_RECORD_LEN: usize = 14;
pub const LAYER_BINDINGS_RECORD_LEN: usize = BINDING_RECORD_LEN * 2;
pub const TABLE_RECORD_LEN: usize = LAYER_BINDINGS_RECORD_LEN * MAX_SENSORS * MAX_LAYERS;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SensorIndex(u8);

impl TryFrom<u32> for SensorIndex {
    type Error = OutOfRange;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        match u8::try_from(index) {
            Ok(narrow) if usize::from(narrow) < MAX_SENSORS => Ok(Self(narrow)),
            _ => Err(OutOfRange {
                kind: IndexKind::Sensor,
                index,
                limit: MAX_SENSORS,
            }),
        }
    }
}

impl SensorIndex {
    pub fn new(index: u8) -> Result<Self, OutOfRange> {
        Self::try_from(u32::from(index))
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..MAX_SENSORS as u8).map(Self)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LayerIndex(u8);

impl TryFrom<u32> for LayerIndex {
    type Error = OutOfRange;

    fn try_from(index: u32) -> Result<Self, Self::Error> {
        match u8::try_from(index) {
            Ok(narrow) if usize::from(narrow) < MAX_LAYERS => Ok(Self(narrow)),
            _ => Err(OutOfRange {
                kind: IndexKind::Layer,
                index,
                limit: MAX_LAYERS,
            }),
        }
    }
}

impl LayerIndex {
    pub fn new(index: u8) -> Result<Self, OutOfRange> {
        Self::try_from(u32::from(index))
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..MAX_LAYERS as u8).map(Self)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Cw,
    Ccw,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cw => "CW",
            Self::Ccw => "CCW",
        }
    }
}

/// Opaque reference to a host behavior. `0` means "unset".
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ActionId(pub u16);

impl ActionId {
    pub const UNSET: Self = Self(0);

    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Binding {
    pub action: ActionId,
    pub param1: u32,
    pub param2: u32,
    pub tap_ms: u32,
}

impl Binding {
    pub const UNSET: Self = Self {
        action: ActionId::UNSET,
        param1: 0,
        param2: 0,
        tap_ms: 0,
    };

    pub const fn is_configured(&self) -> bool {
        !self.action.is_unset()
    }

    pub fn encode(&self, out: &mut [u8; BINDING_RECORD_LEN]) {
        out[0..2].copy_from_slice(&self.action.0.to_le_bytes());
        out[2..6].copy_from_slice(&self.param1.to_le_bytes());
        out[6..10].copy_from_slice(&self.param2.to_le_bytes());
        out[10..14].copy_from_slice(&self.tap_ms.to_le_bytes());
    }

    pub fn decode(record: &[u8; BINDING_RECORD_LEN]) -> Self {
        let u32_at = |at: usize| {
            u32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
        };
        Self {
            action: ActionId(u16::from_le_bytes([record[0], record[1]])),
            param1: u32_at(2),
            param2: u32_at(6),
            tap_ms: u32_at(10),
        }
    }
}

/// The CW/CCW pair stored for one (sensor, layer). Unit of persistence.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LayerBindings {
    pub cw: Binding,
    pub ccw: Binding,
}

impl LayerBindings {
    pub const UNSET: Self = Self {
        cw: Binding::UNSET,
        ccw: Binding::UNSET,
    };

    pub const fn get(&self, direction: Direction) -> &Binding {
        match direction {
            Direction::Cw => &self.cw,
            Direction::Ccw => &self.ccw,
        }
    }

    pub fn set(&mut self, direction: Direction, binding: Binding) {
        match direction {
            Direction::Cw => self.cw = binding,
            Direction::Ccw => self.ccw = binding,
        }
    }

    pub fn encode(&self, out: &mut [u8; LAYER_BINDINGS_RECORD_LEN]) {
        let (cw, ccw) = out.split_at_mut(BINDING_RECORD_LEN);
        let mut record = [0u8; BINDING_RECORD_LEN];
        self.cw.encode(&mut record);
        cw.copy_from_slice(&record);
        self.ccw.encode(&mut record);
        ccw.copy_from_slice(&record);
    }

    pub fn decode(record: &[u8; LAYER_BINDINGS_RECORD_LEN]) -> Self {
        let mut half = [0u8; BINDING_RECORD_LEN];
        half.copy_from_slice(&record[..BINDING_RECORD_LEN]);
        let cw = Binding::decode(&half);
        half.copy_from_slice(&record[BINDING_RECORD_LEN..]);
        let ccw = Binding::decode(&half);
        Self { cw, ccw }
    }
}

/// Raw incremental reading: integer degrees plus micro-degrees, or a
/// pre-quantized tick count in `val2` when `val1 == 0`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SensorValue {
    pub val1: i32,
    pub val2: i32,
}

impl SensorValue {
    pub const fn new(val1: i32, val2: i32) -> Self {
        Self { val1, val2 }
    }
}

/// Trigger resolution of a sensor; restricted to 1..=360 so that one trigger
/// always spans at least one degree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TriggersPerRotation(u16);

impl TriggersPerRotation {
    pub const fn new(triggers: u16) -> Option<Self> {
        if triggers == 0 || triggers > 360 {
            None
        } else {
            Some(Self(triggers))
        }
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    pub const fn trigger_degrees(self) -> i32 {
        360 / self.0 as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_reject_values_at_the_limit() {
        assert!(SensorIndex::new(MAX_SENSORS as u8 - 1).is_ok());
        let err = SensorIndex::new(MAX_SENSORS as u8).unwrap_err();
        assert_eq!(err.kind, IndexKind::Sensor);
        assert_eq!(err.limit, MAX_SENSORS);

        assert!(LayerIndex::new(MAX_LAYERS as u8 - 1).is_ok());
        assert_eq!(
            LayerIndex::new(u8::MAX).unwrap_err().kind,
            IndexKind::Layer
        );
        assert_eq!(SensorIndex::all().count(), MAX_SENSORS);
        assert_eq!(LayerIndex::try_from(300u32).unwrap_err().index, 300);
        assert_eq!(SensorIndex::try_from(1u32).map(SensorIndex::get), Ok(1));
        assert_eq!(LayerIndex::all().count(), MAX_LAYERS);
    }

    #[test]
    fn layer_bindings_record_layout_is_little_endian() {
        let bindings = LayerBindings {
            cw: Binding {
                action: ActionId(0x0102),
                param1: 0x0A0B_0C0D,
                param2: 7,
                tap_ms: 5,
            },
            ccw: Binding::UNSET,
        };
        let mut record = [0u8; LAYER_BINDINGS_RECORD_LEN];
        bindings.encode(&mut record);

        assert_eq!(&record[0..2], &[0x02, 0x01]);
        assert_eq!(&record[2..6], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(record[10], 5);
        assert!(record[BINDING_RECORD_LEN..].iter().all(|&b| b == 0));
        assert_eq!(LayerBindings::decode(&record), bindings);
    }

    #[test]
    fn triggers_per_rotation_bounds() {
        assert!(TriggersPerRotation::new(0).is_none());
        assert!(TriggersPerRotation::new(361).is_none());
        assert_eq!(
            TriggersPerRotation::new(4).map(TriggersPerRotation::trigger_degrees),
            Some(90)
        );
        assert_eq!(
            TriggersPerRotation::new(360).map(TriggersPerRotation::trigger_degrees),
            Some(1)
        );
        assert_eq!(
            TriggersPerRotation::new(7).map(TriggersPerRotation::trigger_degrees),
            Some(51)
        );
    }
}
