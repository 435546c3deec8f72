use embedded_storage::Storage;

use super::{KvStore, SETTINGS_KEY_MAX};
use crate::{error::PersistError, types::TABLE_RECORD_LEN};

const SLOT_MAGIC: u32 = 0x5253_5231;
const SLOT_VERSION: u8 = 1;
const KEY_LEN_AT: usize = 5;
const KEY_AT: usize = 6;
const BLOB_LEN_AT: usize = KEY_AT + SETTINGS_KEY_MAX;
const BLOB_AT: usize = BLOB_LEN_AT + 2;
const BLOB_MAX: usize = TABLE_RECORD_LEN;

/// Bytes occupied by one key/blob slot, checksum included.
pub const FLASH_SLOT_LEN: usize = BLOB_AT + BLOB_MAX + 1;

/// Key/blob store over a fixed run of flash slots.
///
/// Each slot holds magic, version, key, blob length, blob and a trailing
/// checksum. Anything that fails those checks reads as a free slot.
pub struct FlashKvStore<F> {
    flash: F,
    offset: u32,
    slots: usize,
}

impl<F: Storage> FlashKvStore<F> {
    pub fn new(flash: F, offset: u32, slots: usize) -> Self {
        Self {
            flash,
            offset,
            slots,
        }
    }

    /// Places the slots at the very end of the device.
    pub fn at_end(flash: F, slots: usize) -> Self {
        let span = (slots * FLASH_SLOT_LEN) as u32;
        let offset = (flash.capacity() as u32).saturating_sub(span);
        Self::new(flash, offset, slots)
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    fn slot_offset(&self, slot: usize) -> u32 {
        self.offset + (slot * FLASH_SLOT_LEN) as u32
    }

    fn load_record(&mut self, slot: usize) -> Result<Option<[u8; FLASH_SLOT_LEN]>, PersistError> {
        let mut record = [0u8; FLASH_SLOT_LEN];
        self.flash
            .read(self.slot_offset(slot), &mut record)
            .map_err(|_| PersistError::Store)?;
        if record.iter().all(|&byte| byte == 0xFF) {
            return Ok(None);
        }
        match validate(&record) {
            Ok(()) => Ok(Some(record)),
            Err(err) => {
                log::warn!("persist: flash slot {slot} invalid: {err}");
                Ok(None)
            }
        }
    }
}

impl<F: Storage> KvStore for FlashKvStore<F> {
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<(), PersistError> {
        if key.len() > SETTINGS_KEY_MAX {
            return Err(PersistError::UnknownKey);
        }
        if blob.len() > BLOB_MAX {
            return Err(PersistError::SizeMismatch {
                expected: BLOB_MAX,
                actual: blob.len(),
            });
        }

        let mut free = None;
        let mut target = None;
        for slot in 0..self.slots {
            match self.load_record(slot)? {
                Some(record) if record_key(&record) == key.as_bytes() => {
                    target = Some(slot);
                    break;
                }
                Some(_) => {}
                None if free.is_none() => free = Some(slot),
                None => {}
            }
        }
        let Some(slot) = target.or(free) else {
            log::error!("persist: flash slots exhausted for {key}");
            return Err(PersistError::Store);
        };

        let mut record = [0xFFu8; FLASH_SLOT_LEN];
        record[0..4].copy_from_slice(&SLOT_MAGIC.to_le_bytes());
        record[4] = SLOT_VERSION;
        record[KEY_LEN_AT] = key.len() as u8;
        record[KEY_AT..KEY_AT + key.len()].copy_from_slice(key.as_bytes());
        record[BLOB_LEN_AT..BLOB_AT].copy_from_slice(&(blob.len() as u16).to_le_bytes());
        record[BLOB_AT..BLOB_AT + blob.len()].copy_from_slice(blob);
        record[FLASH_SLOT_LEN - 1] = checksum8(&record[..FLASH_SLOT_LEN - 1]);

        self.flash
            .write(self.slot_offset(slot), &record)
            .map_err(|_| PersistError::Store)
    }

    fn load_all(&mut self, visit: &mut dyn FnMut(&str, &[u8])) -> Result<(), PersistError> {
        for slot in 0..self.slots {
            let Some(record) = self.load_record(slot)? else {
                continue;
            };
            let Ok(key) = core::str::from_utf8(record_key(&record)) else {
                log::warn!("persist: flash slot {slot} key is not utf-8");
                continue;
            };
            visit(key, record_blob(&record));
        }
        Ok(())
    }
}

fn validate(record: &[u8; FLASH_SLOT_LEN]) -> Result<(), PersistError> {
    if u32::from_le_bytes([record[0], record[1], record[2], record[3]]) != SLOT_MAGIC
        || record[4] != SLOT_VERSION
    {
        return Err(PersistError::Corrupted);
    }
    if record[FLASH_SLOT_LEN - 1] != checksum8(&record[..FLASH_SLOT_LEN - 1]) {
        return Err(PersistError::Corrupted);
    }
    if usize::from(record[KEY_LEN_AT]) > SETTINGS_KEY_MAX {
        return Err(PersistError::Corrupted);
    }
    let blob_len = usize::from(u16::from_le_bytes([record[BLOB_LEN_AT], record[BLOB_LEN_AT + 1]]));
    if blob_len > BLOB_MAX {
        return Err(PersistError::Corrupted);
    }
    Ok(())
}

fn record_key(record: &[u8; FLASH_SLOT_LEN]) -> &[u8] {
    &record[KEY_AT..KEY_AT + usize::from(record[KEY_LEN_AT])]
}

fn record_blob(record: &[u8; FLASH_SLOT_LEN]) -> &[u8] {
    let len = usize::from(u16::from_le_bytes([record[BLOB_LEN_AT], record[BLOB_LEN_AT + 1]]));
    &record[BLOB_AT..BLOB_AT + len]
}

fn checksum8(bytes: &[u8]) -> u8 {
    let mut acc = 0x5Au8;
    for &byte in bytes {
        acc ^= byte.rotate_left(1);
    }
    acc
}
