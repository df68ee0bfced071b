//! Typed decoding of jumping contract objects and events. Nothing outside
//! this module looks at raw RPC JSON.

use serde_json::Value;

use super::ChainEvent;
use crate::{
    error::{AppError, Result},
    game::session::{AccountInfo, GameSessionSnapshot, SessionKey},
};

/// Payload of the event emitted by `next_step` / `endless_next_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub safe_pos: i64,
}

impl StepEvent {
    /// First emitted event that carries a `safe_pos` field.
    pub fn from_events(events: &[ChainEvent]) -> Option<Self> {
        events.iter().find_map(|event| {
            let safe_pos = event.parsed_json.get("safe_pos")?;
            lenient_i64(safe_pos).map(|safe_pos| StepEvent { safe_pos })
        })
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn path<'a>(value: &'a Value, keys: &[&str]) -> Result<&'a Value> {
    keys.iter().try_fold(value, |current, key| {
        current
            .get(key)
            .ok_or_else(|| AppError::Decode(format!("missing field `{}`", keys.join("."))))
    })
}

fn u64_at(value: &Value, keys: &[&str]) -> Result<u64> {
    let raw = path(value, keys)?;
    lenient_u64(raw)
        .ok_or_else(|| AppError::Decode(format!("field `{}` is not an integer", keys.join("."))))
}

fn progress(data: &Value, session_key: SessionKey) -> Result<GameSessionSnapshot> {
    let position = u64_at(data, &["list"])?;
    let total_length = u64_at(data, &["end"])?;
    Ok(GameSessionSnapshot {
        session_key,
        position,
        total_length: total_length.max(position),
        accrued_reward: u64_at(data, &["cur_step_paid"])?,
        final_reward: u64_at(data, &["final_reward"])?,
    })
}

/// Id of the table holding one entry per identity.
pub fn decode_pool_table_id(pool_fields: &Value) -> Result<String> {
    path(pool_fields, &["pool_table", "fields", "id", "id"])?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Decode("pool table id is not a string".to_string()))
}

/// Name of a dynamic field entry, which for the pool table is the identity id.
pub fn dynamic_field_name(name: &Value) -> Option<&str> {
    name.get("value").and_then(Value::as_str)
}

/// Decodes the `Field<ID, UserInfo>` object of one identity.
pub fn decode_account(identity: &str, entry_fields: &Value) -> Result<AccountInfo> {
    let info = path(entry_fields, &["value", "fields"])?;
    let steps = u64_at(info, &["steps"])?;
    let contents = path(info, &["hash_data", "fields", "contents"])?
        .as_array()
        .ok_or_else(|| AppError::Decode("hash_data.contents is not a list".to_string()))?;

    let mut games = Vec::with_capacity(contents.len());
    for entry in contents {
        let fields = path(entry, &["fields"])?;
        let key = path(fields, &["key"])?
            .as_str()
            .ok_or_else(|| AppError::Decode("game key is not a string".to_string()))?;
        let data = path(fields, &["value", "fields"])?;
        games.push(progress(data, SessionKey::Keyed(key.to_string()))?);
    }

    Ok(AccountInfo {
        identity: identity.to_string(),
        steps,
        games,
    })
}

/// Decodes the endless-game singleton; its index doubles as the row selector.
pub fn decode_endless_game(fields: &Value) -> Result<GameSessionSnapshot> {
    let idx = u64_at(fields, &["idx"])?;
    let row = u8::try_from(idx)
        .map_err(|_| AppError::Decode(format!("endless index {} does not fit a row", idx)))?;
    let data = path(fields, &["data", "fields"])?;
    progress(data, SessionKey::Endless { row })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn game_entry(key: &str, list: u64, end: u64) -> Value {
        json!({
            "fields": {
                "key": key,
                "value": { "fields": {
                    "list": list.to_string(),
                    "row": "0",
                    "end": end,
                    "cur_step_paid": "4",
                    "final_reward": "100"
                }}
            }
        })
    }

    #[test]
    fn step_event_reads_numeric_or_string_safe_pos() {
        let events = vec![
            ChainEvent {
                event_type: "0x2::coin::Other".to_string(),
                parsed_json: json!({ "amount": 5 }),
            },
            ChainEvent {
                event_type: "0x1::data::StepEvent".to_string(),
                parsed_json: json!({ "safe_pos": "1" }),
            },
        ];
        assert_eq!(StepEvent::from_events(&events), Some(StepEvent { safe_pos: 1 }));
        assert_eq!(StepEvent::from_events(&[]), None);
    }

    #[test]
    fn account_decodes_all_games() {
        let fields = json!({
            "name": "0xbb",
            "value": { "fields": {
                "steps": "12",
                "hash_data": { "fields": { "contents": [
                    game_entry("a".repeat(32).as_str(), 2, 5),
                    game_entry("b".repeat(32).as_str(), 0, 20),
                ]}}
            }}
        });
        let account = decode_account("0xbb", &fields).unwrap();
        assert_eq!(account.steps, 12);
        assert_eq!(account.games.len(), 2);
        assert_eq!(account.games[0].position, 2);
        assert_eq!(account.games[0].accrued_reward, 4);
        let key = SessionKey::Keyed("b".repeat(32));
        assert_eq!(account.game(&key).unwrap().total_length, 20);
    }

    #[test]
    fn endless_game_index_becomes_row() {
        let fields = json!({
            "idx": "3",
            "data": { "fields": {
                "list": 7, "row": 1, "end": 50, "cur_step_paid": 2, "final_reward": 1000
            }}
        });
        let snapshot = decode_endless_game(&fields).unwrap();
        assert_eq!(snapshot.session_key, SessionKey::Endless { row: 3 });
        assert_eq!(snapshot.position, 7);
        assert_eq!(snapshot.total_length, 50);
    }

    #[test]
    fn missing_fields_are_decode_errors() {
        let err = decode_pool_table_id(&json!({ "pool_table": {} })).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn pool_table_id_is_extracted() {
        let fields = json!({ "pool_table": { "fields": { "id": { "id": "0xtable" } } } });
        assert_eq!(decode_pool_table_id(&fields).unwrap(), "0xtable");
    }
}
