//! In-memory stand-in for a fullnode running the jumping contract.

use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use super::{
    transaction::{MoveCall, PureArg, TxArg, UnsignedTx},
    ChainEvent, ChainRpc, DryRunResult, DynamicFieldEntry, ExecuteResult, ExecutionStatus,
    ObjectData, OwnedObjectRef, Page,
};
use crate::{
    config::ChainObjects,
    constants::{
        FN_BUY_STEPS, FN_CLEAR_USER_INFO, FN_ENDLESS_NEXT_STEP, FN_NEW_GAME,
        FN_NEW_GAME_WITH_NFT, FN_NEXT_STEP,
    },
    error::{AppError, Result},
    utils::ids_eq,
};

pub const TABLE_ID: &str = "0x7ab1e";
const PAGE_SIZE: usize = 2;

#[derive(Debug, Clone)]
pub struct FakeGame {
    pub key: String,
    pub list: u64,
    pub end: u64,
    pub cur_step_paid: u64,
    pub final_reward: u64,
    pub trapped: bool,
}

#[derive(Debug, Clone, Default)]
struct FakeAccount {
    steps: u64,
    games: Vec<FakeGame>,
}

#[derive(Debug, Clone)]
struct World {
    accounts: BTreeMap<String, FakeAccount>,
    endless: FakeGame,
    endless_idx: u64,
    owned: BTreeMap<String, Vec<String>>,
    minted: u64,
}

#[derive(Default)]
struct Script {
    safe_positions: VecDeque<i64>,
    dry_run_failures: VecDeque<String>,
    stale_executes: usize,
    missing_events: usize,
    transport_failures: usize,
    hidden_scans: usize,
}

#[derive(Default)]
struct Stats {
    dry_runs: usize,
    executed: Vec<String>,
    finality_waits: usize,
    digests: u64,
}

pub struct FakeChain {
    objects: ChainObjects,
    new_game_length: u64,
    world: Mutex<World>,
    script: Mutex<Script>,
    stats: Mutex<Stats>,
}

impl FakeChain {
    pub fn new(objects: ChainObjects) -> Self {
        Self {
            objects,
            new_game_length: 5,
            world: Mutex::new(World {
                accounts: BTreeMap::new(),
                endless: FakeGame {
                    key: String::new(),
                    list: 0,
                    end: 50,
                    cur_step_paid: 0,
                    final_reward: 1000,
                    trapped: false,
                },
                endless_idx: 1,
                owned: BTreeMap::new(),
                minted: 0,
            }),
            script: Mutex::new(Script::default()),
            stats: Mutex::new(Stats::default()),
        }
    }

    pub fn with_game_length(mut self, length: u64) -> Self {
        self.new_game_length = length;
        self
    }

    // ---- scripting ----

    pub fn push_safe_pos(&self, safe_pos: i64) {
        self.script.lock().unwrap().safe_positions.push_back(safe_pos);
    }

    pub fn fail_next_dry_run(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .dry_run_failures
            .push_back(reason.to_string());
    }

    pub fn stale_next_execute(&self) {
        self.script.lock().unwrap().stale_executes += 1;
    }

    pub fn drop_next_events(&self) {
        self.script.lock().unwrap().missing_events += 1;
    }

    pub fn fail_next_transport(&self) {
        self.script.lock().unwrap().transport_failures += 1;
    }

    pub fn hide_entries_for(&self, scans: usize) {
        self.script.lock().unwrap().hidden_scans = scans;
    }

    pub fn seed_account(&self, identity: &str, steps: u64) {
        self.world
            .lock()
            .unwrap()
            .accounts
            .entry(identity.to_string())
            .or_default()
            .steps = steps;
    }

    pub fn seed_game(&self, identity: &str, key: &str, list: u64, end: u64) {
        let mut world = self.world.lock().unwrap();
        world
            .accounts
            .entry(identity.to_string())
            .or_default()
            .games
            .push(FakeGame {
                key: key.to_string(),
                list,
                end,
                cur_step_paid: 0,
                final_reward: 100,
                trapped: false,
            });
    }

    /// Moves a game forward behind the client's back (another device).
    pub fn advance_game(&self, identity: &str, key: &str, steps: u64) {
        let mut world = self.world.lock().unwrap();
        if let Some(game) = find_game(&mut world, identity, key) {
            game.list = (game.list + steps).min(game.end);
        }
    }

    pub fn give_identity(&self, owner: &str, identity: &str) {
        self.world
            .lock()
            .unwrap()
            .owned
            .entry(owner.to_string())
            .or_default()
            .push(identity.to_string());
    }

    // ---- inspection ----

    pub fn game(&self, identity: &str, key: &str) -> Option<FakeGame> {
        let mut world = self.world.lock().unwrap();
        find_game(&mut world, identity, key).cloned()
    }

    pub fn game_count(&self, identity: &str) -> usize {
        self.world
            .lock()
            .unwrap()
            .accounts
            .get(identity)
            .map(|a| a.games.len())
            .unwrap_or(0)
    }

    pub fn dry_runs(&self) -> usize {
        self.stats.lock().unwrap().dry_runs
    }

    pub fn executed(&self) -> Vec<String> {
        self.stats.lock().unwrap().executed.clone()
    }

    pub fn finality_waits(&self) -> usize {
        self.stats.lock().unwrap().finality_waits
    }

    fn entry_id(identity: &str) -> String {
        format!("0xentry{}", identity.trim_start_matches("0x"))
    }

    fn take_transport_failure(&self) -> bool {
        let mut script = self.script.lock().unwrap();
        if script.transport_failures > 0 {
            script.transport_failures -= 1;
            return true;
        }
        false
    }
}

fn find_game<'a>(world: &'a mut World, identity: &str, key: &str) -> Option<&'a mut FakeGame> {
    world
        .accounts
        .get_mut(identity)?
        .games
        .iter_mut()
        .find(|g| g.key == key)
}

fn pure_str(call: &MoveCall, index: usize) -> std::result::Result<String, String> {
    match call.arguments.get(index) {
        Some(TxArg::Pure {
            value: PureArg::Id(v) | PureArg::String(v) | PureArg::Address(v),
        }) => Ok(v.clone()),
        Some(TxArg::Object { id }) => Ok(id.clone()),
        other => Err(format!("argument {} has unexpected shape: {:?}", index, other)),
    }
}

fn pure_u8(call: &MoveCall, index: usize) -> std::result::Result<u8, String> {
    match call.arguments.get(index) {
        Some(TxArg::Pure {
            value: PureArg::U8(v),
        }) => Ok(*v),
        other => Err(format!("argument {} is not u8: {:?}", index, other)),
    }
}

fn step_on(game: &mut FakeGame, chosen: u8, safe_pos: i64) -> std::result::Result<(), String> {
    if game.trapped || game.list >= game.end {
        return Err("MoveAbort: game already finished".to_string());
    }
    if safe_pos == chosen as i64 {
        game.list += 1;
        game.cur_step_paid += 1;
    } else if safe_pos >= 0 {
        // A failure lengthens the run by one tile.
        game.trapped = true;
        game.end += 1;
    }
    Ok(())
}

impl FakeChain {
    /// Applies the data-module call of `tx` to `world`. Returns emitted events.
    fn apply(
        &self,
        world: &mut World,
        tx: &UnsignedTx,
        safe_pos: Option<i64>,
    ) -> std::result::Result<Vec<ChainEvent>, String> {
        let sender = tx.sender.clone().ok_or("no sender")?;
        let call = tx
            .move_calls()
            .find(|c| c.module == crate::constants::MODULE_DATA)
            .ok_or("no data call")?;

        match call.function.as_str() {
            f if f == FN_NEW_GAME || f == FN_NEW_GAME_WITH_NFT => {
                let identity = if f == FN_NEW_GAME {
                    pure_str(call, 1)?
                } else {
                    world.minted += 1;
                    let id = format!("0x{:064x}", 0xa000 + world.minted);
                    world.owned.entry(sender.clone()).or_default().push(id.clone());
                    id
                };
                let key = pure_str(call, 2)?;
                let length = self.new_game_length;
                let account = world.accounts.entry(identity).or_default();
                if account.games.iter().any(|g| g.key == key) {
                    return Err("MoveAbort: duplicate session key".to_string());
                }
                account.games.push(FakeGame {
                    key,
                    list: 0,
                    end: length,
                    cur_step_paid: 0,
                    final_reward: 100,
                    trapped: false,
                });
                Ok(vec![])
            }
            f if f == FN_NEXT_STEP => {
                let identity = pure_str(call, 2)?;
                let key = pure_str(call, 3)?;
                let chosen = pure_u8(call, 4)?;
                let safe_pos = safe_pos.unwrap_or(chosen as i64);
                let game = find_game(world, &identity, &key)
                    .ok_or_else(|| "MoveAbort: no such game".to_string())?;
                step_on(game, chosen, safe_pos)?;
                Ok(vec![step_event(safe_pos)])
            }
            f if f == FN_ENDLESS_NEXT_STEP => {
                let row = pure_u8(call, 4)?;
                if row as u64 != world.endless_idx {
                    return Err("MoveAbort: stale endless row".to_string());
                }
                let chosen = pure_u8(call, 5)?;
                let safe_pos = safe_pos.unwrap_or(chosen as i64);
                step_on(&mut world.endless, chosen, safe_pos)?;
                Ok(vec![step_event(safe_pos)])
            }
            f if f == FN_CLEAR_USER_INFO => {
                let identity = pure_str(call, 1)?;
                let owns = world
                    .owned
                    .get(&sender)
                    .is_some_and(|ids| ids.iter().any(|id| ids_eq(id, &identity)));
                if !owns {
                    return Err(format!(
                        "InvalidOwner: {} is not owned by {}",
                        identity, sender
                    ));
                }
                if let Some(account) = world.accounts.get_mut(&identity) {
                    account.games.retain(|g| !g.trapped && g.list < g.end);
                }
                Ok(vec![])
            }
            f if f == FN_BUY_STEPS => {
                let identity = pure_str(call, 1)?;
                world.accounts.entry(identity).or_default().steps += 10;
                Ok(vec![])
            }
            other => Err(format!("unknown function {}", other)),
        }
    }
}

fn step_event(safe_pos: i64) -> ChainEvent {
    ChainEvent {
        event_type: "0xpkg::data::NextStepEvent".to_string(),
        parsed_json: json!({ "safe_pos": safe_pos }),
    }
}

fn game_json(game: &FakeGame) -> Value {
    json!({
        "fields": {
            "key": game.key,
            "value": { "fields": {
                "list": game.list.to_string(),
                "row": "0",
                "end": game.end.to_string(),
                "cur_step_paid": game.cur_step_paid.to_string(),
                "final_reward": game.final_reward.to_string()
            }}
        }
    })
}

fn paginate<T: Clone>(items: &[T], cursor: Option<String>) -> Page<T> {
    let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + PAGE_SIZE).min(items.len());
    let has_next_page = end < items.len();
    Page {
        data: items.get(start..end).map(|s| s.to_vec()).unwrap_or_default(),
        next_cursor: has_next_page.then(|| end.to_string()),
        has_next_page,
    }
}

#[async_trait::async_trait]
impl ChainRpc for FakeChain {
    async fn dry_run(&self, tx: &UnsignedTx) -> Result<DryRunResult> {
        self.stats.lock().unwrap().dry_runs += 1;
        if self.take_transport_failure() {
            return Err(AppError::Transport("connection refused".to_string()));
        }
        if let Some(reason) = self.script.lock().unwrap().dry_run_failures.pop_front() {
            return Ok(DryRunResult {
                status: ExecutionStatus::Failure(reason),
                events: vec![],
            });
        }
        let peek = self.script.lock().unwrap().safe_positions.front().copied();
        let mut scratch = self.world.lock().unwrap().clone();
        Ok(match self.apply(&mut scratch, tx, peek) {
            Ok(events) => DryRunResult {
                status: ExecutionStatus::Success,
                events,
            },
            Err(reason) => DryRunResult {
                status: ExecutionStatus::Failure(reason),
                events: vec![],
            },
        })
    }

    async fn execute(&self, tx: &UnsignedTx) -> Result<ExecuteResult> {
        if self.take_transport_failure() {
            return Err(AppError::Transport("connection reset".to_string()));
        }
        let digest = {
            let mut stats = self.stats.lock().unwrap();
            stats.digests += 1;
            format!("0xdigest{}", stats.digests)
        };

        {
            let mut script = self.script.lock().unwrap();
            if script.stale_executes > 0 {
                script.stale_executes -= 1;
                return Ok(ExecuteResult {
                    digest,
                    status: ExecutionStatus::Failure("MoveAbort: object version changed".into()),
                    events: vec![],
                });
            }
        }

        let safe_pos = self.script.lock().unwrap().safe_positions.pop_front();
        let applied = {
            let mut world = self.world.lock().unwrap();
            self.apply(&mut world, tx, safe_pos)
        };
        let (status, mut events) = match applied {
            Ok(events) => (ExecutionStatus::Success, events),
            Err(reason) => (ExecutionStatus::Failure(reason), vec![]),
        };
        {
            let mut script = self.script.lock().unwrap();
            if script.missing_events > 0 {
                script.missing_events -= 1;
                events.clear();
            }
        }
        if let Some(call) = tx.move_calls().last() {
            self.stats.lock().unwrap().executed.push(call.function.clone());
        }
        Ok(ExecuteResult {
            digest,
            status,
            events,
        })
    }

    async fn wait_for_finality(&self, _digest: &str) -> Result<()> {
        self.stats.lock().unwrap().finality_waits += 1;
        Ok(())
    }

    async fn get_object(&self, id: &str) -> Result<Option<ObjectData>> {
        if self.take_transport_failure() {
            return Err(AppError::Transport("timed out".to_string()));
        }
        let world = self.world.lock().unwrap();
        if id == self.objects.data_pool_id {
            return Ok(Some(ObjectData {
                object_id: id.to_string(),
                object_type: Some("0xpkg::data::DataPool".to_string()),
                fields: json!({ "pool_table": { "fields": { "id": { "id": TABLE_ID } } } }),
            }));
        }
        if id == self.objects.endless_game_id {
            let game = &world.endless;
            return Ok(Some(ObjectData {
                object_id: id.to_string(),
                object_type: Some("0xpkg::data::EndlessGame".to_string()),
                fields: json!({
                    "idx": world.endless_idx.to_string(),
                    "data": { "fields": {
                        "list": game.list,
                        "row": 0,
                        "end": game.end,
                        "cur_step_paid": game.cur_step_paid,
                        "final_reward": game.final_reward
                    }}
                }),
            }));
        }
        for (identity, account) in &world.accounts {
            if Self::entry_id(identity) == id {
                let games: Vec<Value> = account.games.iter().map(game_json).collect();
                return Ok(Some(ObjectData {
                    object_id: id.to_string(),
                    object_type: None,
                    fields: json!({
                        "name": identity,
                        "value": { "fields": {
                            "steps": account.steps.to_string(),
                            "hash_data": { "fields": { "contents": games } }
                        }}
                    }),
                }));
            }
        }
        Ok(None)
    }

    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<String>,
    ) -> Result<Page<DynamicFieldEntry>> {
        if self.take_transport_failure() {
            return Err(AppError::Transport("timed out".to_string()));
        }
        {
            let mut script = self.script.lock().unwrap();
            if script.hidden_scans > 0 && cursor.is_none() {
                script.hidden_scans -= 1;
                return Ok(Page {
                    data: vec![],
                    next_cursor: None,
                    has_next_page: false,
                });
            }
        }
        if parent_id != TABLE_ID {
            return Ok(Page {
                data: vec![],
                next_cursor: None,
                has_next_page: false,
            });
        }
        let world = self.world.lock().unwrap();
        let entries: Vec<DynamicFieldEntry> = world
            .accounts
            .keys()
            .map(|identity| DynamicFieldEntry {
                name: json!({ "type": "0x2::object::ID", "value": identity }),
                object_id: Self::entry_id(identity),
            })
            .collect();
        Ok(paginate(&entries, cursor))
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<String>,
    ) -> Result<Page<OwnedObjectRef>> {
        let world = self.world.lock().unwrap();
        let owned: Vec<OwnedObjectRef> = world
            .owned
            .get(owner)
            .map(|ids| {
                ids.iter()
                    .map(|id| OwnedObjectRef {
                        object_id: id.clone(),
                        object_type: Some(struct_type.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(paginate(&owned, cursor))
    }
}
