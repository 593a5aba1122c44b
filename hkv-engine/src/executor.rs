//! # Command Executor
//!
//! Purpose: the pure function at the center of a worker shard -
//! `(command, &mut Shard) -> Value` - argument validation, dispatch to the
//! `Dict`/`SortedSet`/`SimpleSet`/`CountMinSketch` owned by the shard, and
//! reply construction. Nothing here touches a socket or a channel; `Shard`
//! handles that boundary.
//!
//! Grounded on `original_source/pkg/core/executor.go`'s per-verb `cmdXXX`
//! functions and its `ExecuteAndResponse` dispatch switch. `WRONGTYPE`
//! enforcement (spec's Open Question, resolved as mandatory) and the
//! `DEL`/`PERSIST`/`SCARD`/`ZCARD`/`ZRANGE` supplements pulled from the Go
//! source's `Dict` methods are new relative to the Go switch, added per the
//! expanded command table.

use crate::dict::Dict;
use crate::ordered_index::Item;
use crate::partition::key_slot;
use crate::protocol::{self, Command, Value};
use crate::shard::{KeyKind, Shard};
use crate::simple_set::SimpleSet;
use crate::sketch::CountMinSketch;
use crate::sorted_set::{IndexBackend, SortedSet};
use hkv_common::error::HkvError;

/// Runs one command against `shard`, returning the encoded reply value.
///
/// Non-keyed commands (`PING`, `HELP`, `INFO`) are dispatched here exactly
/// as they arrive; the specification's REDESIGN FLAG on fixed-worker
/// dispatch for those verbs is the caller's (the I/O handler's) concern,
/// not this function's - by the time a `Command` reaches `execute` it has
/// already been routed to a shard.
pub fn execute(shard: &mut Shard, command: Command) -> Value {
    shard.next_tick();
    let verb = command.verb.as_slice();
    let args = command.args;

    let result = match verb {
        b"PING" => cmd_ping(&args),
        b"SET" => cmd_set(shard, &args),
        b"GET" => cmd_get(shard, &args),
        b"TTL" => cmd_ttl(shard, &args),
        b"EXISTS" => cmd_exists(shard, &args),
        b"DEL" => cmd_del(shard, &args),
        b"PERSIST" => cmd_persist(shard, &args),
        b"EXPIRE" => cmd_expire(shard, &args),
        b"SADD" => cmd_sadd(shard, &args),
        b"SREM" => cmd_srem(shard, &args),
        b"SMEMBERS" => cmd_smembers(shard, &args),
        b"SISMEMBER" => cmd_sismember(shard, &args),
        b"SCARD" => cmd_scard(shard, &args),
        b"ZADD" => cmd_zadd(shard, &args),
        b"ZSCORE" => cmd_zscore(shard, &args),
        b"ZRANK" => cmd_zrank(shard, &args),
        b"ZCARD" => cmd_zcard(shard, &args),
        b"ZRANGE" => cmd_zrange(shard, &args),
        b"CMS.INITBYDIM" => cmd_cms_initbydim(shard, &args),
        b"CMS.INITBYPROB" => cmd_cms_initbyprob(shard, &args),
        b"CMS.INCRBY" => cmd_cms_incrby(shard, &args),
        b"CMS.QUERY" => cmd_cms_query(shard, &args),
        b"INFO" => cmd_info(shard, &args),
        b"HELP" => Ok(cmd_help()),
        _ => Err(HkvError::UnknownCommand),
    };

    match result {
        Ok(value) => value,
        Err(err) => protocol::error(err.to_string()),
    }
}

type CmdResult = Result<Value, HkvError>;

fn wrong_arity(name: &str) -> HkvError {
    HkvError::WrongArity(name.to_string())
}

fn parse_i64(arg: &[u8]) -> Result<i64, HkvError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(HkvError::NotAnInteger)
}

fn parse_f64(arg: &[u8]) -> Result<f64, HkvError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or(HkvError::NotAnInteger)
}

fn parse_u32(arg: &[u8]) -> Result<u32, HkvError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(HkvError::NotAnInteger)
}

fn parse_u64(arg: &[u8]) -> Result<u64, HkvError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(HkvError::NotAnInteger)
}

// ---- string / dict commands ----

fn cmd_ping(args: &[Vec<u8>]) -> CmdResult {
    match args.len() {
        0 => Ok(protocol::simple_string("PONG")),
        1 => Ok(protocol::bulk(args[0].clone())),
        _ => Err(wrong_arity("ping")),
    }
}

/// The specification's permissive `SET` arity (§9 Open Question, kept for
/// compatibility): exactly 2 args (no TTL) or exactly 4 (`key value EX
/// seconds`); 3 args is rejected even though it would be unambiguous,
/// matching `original_source`'s `cmdSET`.
fn cmd_set(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 2 || args.len() == 3 || args.len() > 4 {
        return Err(wrong_arity("set"));
    }

    let key = &args[0];
    let value = args[1].clone();

    let expire_at_ms = if args.len() == 4 {
        if !args[2].eq_ignore_ascii_case(b"EX") {
            return Err(HkvError::SyntaxError);
        }
        let seconds = parse_i64(&args[3])?;
        Some(shard.now_ms() + seconds.max(0) * 1000)
    } else {
        None
    };

    shard.check_and_register_kind(key, KeyKind::String)?;
    shard.enforce_key_capacity();
    let tick = shard.next_tick();
    shard.dict.set(key.clone(), value, expire_at_ms, tick);
    Ok(protocol::simple_string("OK"))
}

fn cmd_get(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("get"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::String)?;
    let now_ms = shard.now_ms();
    let tick = shard.next_tick();
    match shard.dict.get(key, now_ms, tick) {
        Some(value) => Ok(protocol::bulk(value.clone())),
        None => Ok(protocol::nil_bulk()),
    }
}

fn cmd_ttl(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("ttl"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::String)?;
    let now_ms = shard.now_ms();
    match shard.dict.ttl_ms(key, now_ms) {
        None => Ok(Value::Integer(-2)),
        Some(-1) => Ok(Value::Integer(-1)),
        Some(remaining_ms) => Ok(Value::Integer(remaining_ms / 1000)),
    }
}

fn cmd_exists(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("exists"));
    }
    let key = &args[0];
    let now_ms = shard.now_ms();
    let exists = match shard.kind_of(key) {
        Some(KeyKind::String) | None => shard.dict.peek_exists(key, now_ms),
        Some(KeyKind::Set) => shard.sets.get(key.as_slice()).is_some(),
        Some(KeyKind::ZSet) => shard.sorted_sets.get(key.as_slice()).is_some(),
        Some(KeyKind::Sketch) | Some(KeyKind::Bloom) => true,
    };
    Ok(Value::Integer(exists as i64))
}

/// Deletes one or more keys. The specification's cross-shard non-goal is
/// made observable here: every key after the first must hash to the same
/// shard as the first (the shard the command was already routed to) or the
/// request is rejected outright rather than partially applied.
fn cmd_del(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.is_empty() {
        return Err(wrong_arity("del"));
    }

    if args.len() > 1 {
        let num_shards = shard.config.worker_num.max(1);
        let home = key_slot(&args[0], num_shards);
        for key in &args[1..] {
            if key_slot(key, num_shards) != home {
                return Err(HkvError::CrossSlot);
            }
        }
    }

    let now_ms = shard.now_ms();
    let mut removed = 0i64;
    for key in args {
        let deleted = match shard.kind_of(key) {
            Some(KeyKind::String) | None => shard.dict.del(key, now_ms),
            Some(KeyKind::Set) => shard.sets.remove(key.as_slice()).is_some(),
            Some(KeyKind::ZSet) => shard.sorted_sets.remove(key.as_slice()).is_some(),
            Some(KeyKind::Sketch) => shard.sketches.remove(key.as_slice()).is_some(),
            Some(KeyKind::Bloom) => shard.blooms.remove(key.as_slice()).is_some(),
        };
        if deleted {
            shard.purge_key(key);
            removed += 1;
        }
    }
    Ok(Value::Integer(removed))
}

fn cmd_persist(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("persist"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::String)?;
    let now_ms = shard.now_ms();
    let cleared = shard.dict.persist(key, now_ms);
    Ok(Value::Integer(cleared as i64))
}

/// `EXPIRE key seconds` sets an absolute TTL on an existing key, the
/// counterpart to `SET key value EX seconds` for a key that already
/// exists. Added per `hkv-client`'s `expire()` call - not present in
/// `original_source`'s command switch, but a natural extension of `SET`'s
/// own `EX` handling and the `PERSIST` command already in the table.
fn cmd_expire(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 2 {
        return Err(wrong_arity("expire"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::String)?;
    let seconds = parse_i64(&args[1])?;
    let now_ms = shard.now_ms();
    let deadline_ms = now_ms + seconds.max(0) * 1000;
    let applied = shard.dict.expire_at(key, deadline_ms, now_ms);
    Ok(Value::Integer(applied as i64))
}

// ---- simple set commands ----

fn cmd_sadd(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 2 {
        return Err(wrong_arity("sadd"));
    }
    let key = &args[0];
    shard.check_and_register_kind(key, KeyKind::Set)?;
    let set = shard.sets.entry(key.clone()).or_insert_with(SimpleSet::new);
    let mut added = 0i64;
    for member in &args[1..] {
        if set.add(member.clone()) {
            added += 1;
        }
    }
    Ok(Value::Integer(added))
}

fn cmd_srem(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 2 {
        return Err(wrong_arity("srem"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::Set)?;
    let Some(set) = shard.sets.get_mut(key.as_slice()) else {
        return Ok(Value::Integer(0));
    };
    let mut removed = 0i64;
    for member in &args[1..] {
        if set.remove(member) {
            removed += 1;
        }
    }
    if set.is_empty() {
        shard.purge_key(key);
    }
    Ok(Value::Integer(removed))
}

fn cmd_smembers(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("smembers"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::Set)?;
    match shard.sets.get(key.as_slice()) {
        Some(set) => Ok(protocol::bulk_array(set.members().cloned())),
        None => Ok(Value::Array(Some(Vec::new()))),
    }
}

fn cmd_sismember(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 2 {
        return Err(wrong_arity("sismember"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::Set)?;
    let is_member = shard
        .sets
        .get(key.as_slice())
        .map(|set| set.contains(&args[1]))
        .unwrap_or(false);
    Ok(Value::Integer(is_member as i64))
}

fn cmd_scard(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("scard"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::Set)?;
    let card = shard.sets.get(key.as_slice()).map(|s| s.card()).unwrap_or(0);
    Ok(Value::Integer(card as i64))
}

// ---- sorted set commands ----

fn cmd_zadd(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return Err(wrong_arity("zadd"));
    }
    let key = &args[0];
    shard.check_and_register_kind(key, KeyKind::ZSet)?;

    let mut pairs = Vec::with_capacity((args.len() - 1) / 2);
    for chunk in args[1..].chunks_exact(2) {
        let score = parse_f64(&chunk[0])?;
        pairs.push((score, chunk[1].clone()));
    }

    let zset = shard
        .sorted_sets
        .entry(key.clone())
        .or_insert_with(|| SortedSet::new(IndexBackend::SkipList));
    let mut added = 0i64;
    for (score, member) in pairs {
        if matches!(zset.add(member, score), crate::ordered_index::AddOutcome::Inserted) {
            added += 1;
        }
    }
    Ok(Value::Integer(added))
}

fn cmd_zscore(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 2 {
        return Err(wrong_arity("zscore"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::ZSet)?;
    match shard.sorted_sets.get(key.as_slice()).and_then(|z| z.score(&args[1])) {
        Some(score) => Ok(protocol::bulk(format_score(score))),
        None => Ok(protocol::nil_bulk()),
    }
}

fn cmd_zrank(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 2 {
        return Err(wrong_arity("zrank"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::ZSet)?;
    match shard.sorted_sets.get(key.as_slice()).and_then(|z| z.rank(&args[1])) {
        Some(rank) => Ok(Value::Integer(rank as i64)),
        None => Ok(protocol::nil_bulk()),
    }
}

fn cmd_zcard(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 1 {
        return Err(wrong_arity("zcard"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::ZSet)?;
    let card = shard.sorted_sets.get(key.as_slice()).map(|z| z.card()).unwrap_or(0);
    Ok(Value::Integer(card as i64))
}

/// `ZRANGE key start stop`: ascending rank order over the non-negative
/// `[start, stop]` subset (no negative-index support, per SPEC_FULL's
/// note that this is a nice-to-have with no grounding in the source).
fn cmd_zrange(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 3 {
        return Err(wrong_arity("zrange"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::ZSet)?;
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    if start < 0 || stop < 0 {
        return Err(HkvError::SyntaxError);
    }

    let Some(zset) = shard.sorted_sets.get(key.as_slice()) else {
        return Ok(Value::Array(Some(Vec::new())));
    };
    let items: Vec<Item> = zset.range_by_rank(start as u64, stop as u64);
    Ok(protocol::bulk_array(items.into_iter().map(|item| item.member)))
}

fn format_score(score: f64) -> Vec<u8> {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{}", score as i64).into_bytes()
    } else {
        format!("{score}").into_bytes()
    }
}

// ---- sketch commands ----

fn cmd_cms_initbydim(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 3 {
        return Err(wrong_arity("cms.initbydim"));
    }
    let key = &args[0];
    let width = parse_u32(&args[1])?;
    let depth = parse_u32(&args[2])?;
    shard.check_and_register_kind(key, KeyKind::Sketch)?;
    shard
        .sketches
        .insert(key.clone(), CountMinSketch::init_by_dim(width, depth));
    Ok(protocol::simple_string("OK"))
}

fn cmd_cms_initbyprob(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() != 3 {
        return Err(wrong_arity("cms.initbyprob"));
    }
    let key = &args[0];
    let epsilon = parse_f64(&args[1])?;
    let delta = parse_f64(&args[2])?;
    shard.check_and_register_kind(key, KeyKind::Sketch)?;
    shard
        .sketches
        .insert(key.clone(), CountMinSketch::init_by_prob(epsilon, delta));
    Ok(protocol::simple_string("OK"))
}

/// `CMS.INCRBY key item count [item count ...]` -> array of post-increment
/// estimates, one per item, in request order.
fn cmd_cms_incrby(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 3 || (args.len() - 1) % 2 != 0 {
        return Err(wrong_arity("cms.incrby"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::Sketch)?;
    let Some(sketch) = shard.sketches.get_mut(key.as_slice()) else {
        return Err(HkvError::UnknownCommand);
    };

    let mut results = Vec::with_capacity((args.len() - 1) / 2);
    for chunk in args[1..].chunks_exact(2) {
        let count = parse_u64(&chunk[1])?;
        results.push(Value::Integer(sketch.incr_by(&chunk[0], count) as i64));
    }
    Ok(Value::Array(Some(results)))
}

fn cmd_cms_query(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.len() < 2 {
        return Err(wrong_arity("cms.query"));
    }
    let key = &args[0];
    shard.check_kind(key, KeyKind::Sketch)?;
    let Some(sketch) = shard.sketches.get(key.as_slice()) else {
        return Err(HkvError::UnknownCommand);
    };
    if args.len() == 2 {
        return Ok(Value::Integer(sketch.count(&args[1]) as i64));
    }
    let counts = args[1..].iter().map(|item| Value::Integer(sketch.count(item) as i64));
    Ok(Value::Array(Some(counts.collect())))
}

// ---- info / help ----

fn cmd_info(shard: &mut Shard, args: &[Vec<u8>]) -> CmdResult {
    if args.is_empty() {
        return Ok(protocol::bulk(
            "All sections. Try `INFO keyspace`.\n".to_string().into_bytes(),
        ));
    }
    if args.len() > 1 {
        return Err(wrong_arity("info"));
    }

    if args[0].eq_ignore_ascii_case(b"keyspace") {
        let now_ms = shard.now_ms();
        let keys = shard.dict.len();
        let (expires, avg_ttl) = dict_ttl_stats(&shard.dict, now_ms);
        let body = format!("db0:keys={keys},expires={expires},avg_ttl={avg_ttl}\r\n");
        Ok(protocol::bulk(body.into_bytes()))
    } else {
        Err(HkvError::UnknownInfoSection)
    }
}

fn dict_ttl_stats(dict: &Dict, now_ms: i64) -> (usize, i64) {
    (dict.expiry_len(), dict.avg_ttl_ms(now_ms))
}

fn cmd_help() -> Value {
    let lines = [
        "--------------------------------",
        "PING [message] - Ping the server",
        "GET key - Get the value of a key",
        "SET key value [EX seconds] - Set the value of a key",
        "EXISTS key - Check if a key exists",
        "TTL key - Get the time to live for a key",
        "DEL key [key ...] - Delete one or more keys",
        "PERSIST key - Remove a key's TTL",
        "EXPIRE key seconds - Set a key's TTL",
        "SADD key member [member ...] - Add members to a set",
        "SREM key member [member ...] - Remove members from a set",
        "SMEMBERS key - List a set's members",
        "SISMEMBER key member - Test set membership",
        "SCARD key - Count a set's members",
        "ZADD key score member [score member ...] - Add to a sorted set",
        "ZSCORE key member - Get a sorted set member's score",
        "ZRANK key member - Get a sorted set member's rank",
        "ZCARD key - Count a sorted set's members",
        "ZRANGE key start stop - List a rank range",
        "CMS.INITBYDIM key width depth - Create a Count-Min sketch",
        "CMS.INITBYPROB key epsilon delta - Create a Count-Min sketch",
        "CMS.INCRBY key item count [item count ...] - Increment counts",
        "CMS.QUERY key item [item ...] - Query counts",
        "HELP - Show this help message",
        "--------------------------------",
    ];
    protocol::bulk_array(lines.iter().map(|line| line.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hkv_common::config::Config;

    fn shard() -> Shard {
        Shard::new(Config::default())
    }

    #[test]
    fn ping_with_and_without_message() {
        let mut shard = shard();
        assert_eq!(
            execute(&mut shard, Command { verb: b"PING".to_vec(), args: vec![] }),
            Value::Simple(b"PONG".to_vec())
        );
        assert_eq!(
            execute(
                &mut shard,
                Command { verb: b"PING".to_vec(), args: vec![b"hi".to_vec()] }
            ),
            Value::Bulk(Some(b"hi".to_vec()))
        );
    }

    #[test]
    fn set_never_lets_the_keyspace_exceed_the_cap() {
        let mut config = Config::default();
        config.max_key_number = 10;
        config.eviction_ratio = 0.5;
        let mut shard = Shard::new(config);

        for i in 0..50u32 {
            execute(
                &mut shard,
                Command {
                    verb: b"SET".to_vec(),
                    args: vec![format!("k{i}").into_bytes(), b"v".to_vec()],
                },
            );
            assert!(shard.dict.len() <= 10, "keyspace exceeded cap after insert {i}");
        }
    }

    #[test]
    fn info_keyspace_reports_real_expiry_stats() {
        let mut shard = shard();
        execute(
            &mut shard,
            Command {
                verb: b"SET".to_vec(),
                args: vec![b"k1".to_vec(), b"v".to_vec(), b"EX".to_vec(), b"100".to_vec()],
            },
        );
        execute(
            &mut shard,
            Command { verb: b"SET".to_vec(), args: vec![b"k2".to_vec(), b"v".to_vec()] },
        );

        let reply = execute(
            &mut shard,
            Command { verb: b"INFO".to_vec(), args: vec![b"keyspace".to_vec()] },
        );
        let Value::Bulk(Some(body)) = reply else {
            panic!("expected a bulk reply");
        };
        let body = String::from_utf8(body).unwrap();
        assert!(body.starts_with("db0:keys=2,expires=1,avg_ttl="), "got: {body}");
        assert!(!body.contains("avg_ttl=0\r\n"), "expected a nonzero average TTL, got: {body}");
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut shard = shard();
        execute(
            &mut shard,
            Command { verb: b"SET".to_vec(), args: vec![b"k".to_vec(), b"v".to_vec()] },
        );
        let reply = execute(&mut shard, Command { verb: b"GET".to_vec(), args: vec![b"k".to_vec()] });
        assert_eq!(reply, Value::Bulk(Some(b"v".to_vec())));
    }

    #[test]
    fn set_rejects_three_args_but_allows_ex_ttl() {
        let mut shard = shard();
        let reply = execute(
            &mut shard,
            Command {
                verb: b"SET".to_vec(),
                args: vec![b"k".to_vec(), b"v".to_vec(), b"oops".to_vec()],
            },
        );
        assert!(matches!(reply, Value::Error(_)));

        let reply = execute(
            &mut shard,
            Command {
                verb: b"SET".to_vec(),
                args: vec![b"k".to_vec(), b"v".to_vec(), b"EX".to_vec(), b"1".to_vec()],
            },
        );
        assert_eq!(reply, Value::Simple(b"OK".to_vec()));
    }

    #[test]
    fn ttl_reports_missing_and_no_expiry() {
        let mut shard = shard();
        let reply = execute(&mut shard, Command { verb: b"TTL".to_vec(), args: vec![b"missing".to_vec()] });
        assert_eq!(reply, Value::Integer(-2));

        execute(
            &mut shard,
            Command { verb: b"SET".to_vec(), args: vec![b"k".to_vec(), b"v".to_vec()] },
        );
        let reply = execute(&mut shard, Command { verb: b"TTL".to_vec(), args: vec![b"k".to_vec()] });
        assert_eq!(reply, Value::Integer(-1));
    }

    #[test]
    fn expire_sets_ttl_only_on_existing_key() {
        let mut shard = shard();
        let reply = execute(&mut shard, Command { verb: b"EXPIRE".to_vec(), args: vec![b"missing".to_vec(), b"10".to_vec()] });
        assert_eq!(reply, Value::Integer(0));

        execute(
            &mut shard,
            Command { verb: b"SET".to_vec(), args: vec![b"k".to_vec(), b"v".to_vec()] },
        );
        let reply = execute(&mut shard, Command { verb: b"EXPIRE".to_vec(), args: vec![b"k".to_vec(), b"10".to_vec()] });
        assert_eq!(reply, Value::Integer(1));
        let reply = execute(&mut shard, Command { verb: b"TTL".to_vec(), args: vec![b"k".to_vec()] });
        assert_eq!(reply, Value::Integer(10));
    }

    #[test]
    fn wrongtype_rejects_cross_kind_access() {
        let mut shard = shard();
        execute(
            &mut shard,
            Command { verb: b"SADD".to_vec(), args: vec![b"k".to_vec(), b"m".to_vec()] },
        );
        let reply = execute(&mut shard, Command { verb: b"GET".to_vec(), args: vec![b"k".to_vec()] });
        assert_eq!(reply, Value::Error(b"WRONGTYPE Operation against a key holding the wrong kind of value".to_vec()));
    }

    #[test]
    fn zadd_zrank_matches_spec_scenario() {
        let mut shard = shard();
        execute(
            &mut shard,
            Command { verb: b"ZADD".to_vec(), args: vec![b"z".to_vec(), b"1".to_vec(), b"a".to_vec()] },
        );
        execute(
            &mut shard,
            Command { verb: b"ZADD".to_vec(), args: vec![b"z".to_vec(), b"2".to_vec(), b"b".to_vec()] },
        );
        execute(
            &mut shard,
            Command { verb: b"ZADD".to_vec(), args: vec![b"z".to_vec(), b"1".to_vec(), b"a2".to_vec()] },
        );

        assert_eq!(
            execute(&mut shard, Command { verb: b"ZRANK".to_vec(), args: vec![b"z".to_vec(), b"a".to_vec()] }),
            Value::Integer(0)
        );
        assert_eq!(
            execute(&mut shard, Command { verb: b"ZRANK".to_vec(), args: vec![b"z".to_vec(), b"a2".to_vec()] }),
            Value::Integer(1)
        );
        assert_eq!(
            execute(&mut shard, Command { verb: b"ZRANK".to_vec(), args: vec![b"z".to_vec(), b"b".to_vec()] }),
            Value::Integer(2)
        );
    }

    #[test]
    fn cms_initbydim_incrby_query_matches_spec_scenario() {
        let mut shard = shard();
        execute(
            &mut shard,
            Command {
                verb: b"CMS.INITBYDIM".to_vec(),
                args: vec![b"cms".to_vec(), b"100".to_vec(), b"5".to_vec()],
            },
        );
        let reply = execute(
            &mut shard,
            Command {
                verb: b"CMS.INCRBY".to_vec(),
                args: vec![
                    b"cms".to_vec(),
                    b"apple".to_vec(),
                    b"3".to_vec(),
                    b"banana".to_vec(),
                    b"1".to_vec(),
                ],
            },
        );
        assert_eq!(reply, Value::Array(Some(vec![Value::Integer(3), Value::Integer(1)])));

        let reply = execute(
            &mut shard,
            Command { verb: b"CMS.QUERY".to_vec(), args: vec![b"cms".to_vec(), b"apple".to_vec()] },
        );
        assert_eq!(reply, Value::Integer(3));
    }

    #[test]
    fn del_rejects_cross_slot_keys() {
        let mut shard = shard();
        shard.config.worker_num = 8;
        execute(
            &mut shard,
            Command { verb: b"SET".to_vec(), args: vec![b"a".to_vec(), b"1".to_vec()] },
        );
        // Find two keys that are guaranteed to land on different shards.
        let mut other = None;
        for i in 0..1000 {
            let candidate = format!("k{i}").into_bytes();
            if key_slot(&candidate, 8) != key_slot(b"a", 8) {
                other = Some(candidate);
                break;
            }
        }
        let other = other.expect("expected to find a cross-slot key");
        let reply = execute(
            &mut shard,
            Command { verb: b"DEL".to_vec(), args: vec![b"a".to_vec(), other] },
        );
        assert_eq!(reply, Value::Error(b"ERR cross-slot keys in request".to_vec()));
    }

    #[test]
    fn unknown_command_returns_cmd_not_found() {
        let mut shard = shard();
        let reply = execute(&mut shard, Command { verb: b"NOPE".to_vec(), args: vec![] });
        assert_eq!(reply, Value::Error(b"CMD NOT FOUND".to_vec()));
    }
}
