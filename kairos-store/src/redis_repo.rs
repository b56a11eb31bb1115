use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::debug;
use kairos_core::{CancellationCode, CodeCheck, CodeKey, CodeStore, CoreResult};
use crate::{backend, StoreError};

/// Cancellation codes shared between instances through Redis.
///
/// Each code lives under its own key with a TTL matching its expiry, so Redis
/// drops stale codes itself and `purge_expired` has nothing to do.
#[derive(Clone)]
pub struct RedisCodeStore {
    client: redis::Client,
}

impl RedisCodeStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(key: &CodeKey) -> String {
        format!("cancellation:{}", key)
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)
    }
}

/// Checks one guess and records the attempt in a single server-side step.
/// Replies `{outcome}` or `{outcome, entry_json[, remaining]}`; expiry is
/// judged by the caller from the returned entry.
const CHECK_ATTEMPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return {'missing'}
end
local entry = cjson.decode(raw)
local max = tonumber(ARGV[2])
if entry.attempts >= max then
  redis.call('DEL', KEYS[1])
  return {'exhausted', raw}
end
if entry.code == ARGV[1] then
  redis.call('DEL', KEYS[1])
  return {'matched', raw}
end
entry.attempts = entry.attempts + 1
local remaining = max - entry.attempts
if remaining <= 0 then
  redis.call('DEL', KEYS[1])
else
  redis.call('SET', KEYS[1], cjson.encode(entry), 'KEEPTTL')
end
return {'mismatch', raw, tostring(remaining)}
"#;

fn decode(payload: &str) -> CoreResult<CancellationCode> {
    serde_json::from_str(payload).map_err(|e| backend(StoreError::Corrupt(e.to_string())))
}

/// Map the script reply to a check outcome, letting expiry win over everything else.
fn interpret(reply: &[String], now: DateTime<Utc>) -> CoreResult<CodeCheck> {
    let corrupt = || backend(StoreError::Corrupt(format!("unexpected attempt reply {:?}", reply)));

    let (outcome, entry) = match reply {
        [outcome] if outcome == "missing" => return Ok(CodeCheck::Missing),
        [outcome, raw, ..] => (outcome.as_str(), decode(raw)?),
        _ => return Err(corrupt()),
    };

    if entry.is_expired(now) {
        return Ok(CodeCheck::Expired);
    }

    match (outcome, reply.get(2)) {
        ("exhausted", _) => Ok(CodeCheck::Exhausted),
        ("matched", _) => Ok(CodeCheck::Matched(entry)),
        ("mismatch", Some(remaining)) => {
            let remaining = remaining.parse().map_err(|_| corrupt())?;
            Ok(CodeCheck::Mismatch { remaining })
        }
        _ => Err(corrupt()),
    }
}

/// Seconds until `expires_at`, never less than one so SET EX accepts it.
fn ttl_seconds(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (expires_at - now).num_seconds().max(1) as u64
}

#[async_trait]
impl CodeStore for RedisCodeStore {
    async fn put(&self, code: CancellationCode) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(&code)
            .map_err(|e| backend(StoreError::Corrupt(e.to_string())))?;
        let ttl = ttl_seconds(code.expires_at, Utc::now());

        conn.set_ex::<_, _, ()>(Self::key(&code.key()), payload, ttl)
            .await
            .map_err(backend)?;
        debug!("Stored cancellation code for booking {} (ttl {}s)", code.booking_id, ttl);
        Ok(())
    }

    async fn get(&self, key: &CodeKey) -> CoreResult<Option<CancellationCode>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(Self::key(key)).await.map_err(backend)?;

        payload.as_deref().map(decode).transpose()
    }

    async fn remove(&self, key: &CodeKey) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(Self::key(key)).await.map_err(backend)
    }

    async fn check_and_record_attempt(
        &self,
        key: &CodeKey,
        guess: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
    ) -> CoreResult<CodeCheck> {
        let mut conn = self.connection().await?;
        let redis_key = Self::key(key);

        let reply: Vec<String> = redis::Script::new(CHECK_ATTEMPT)
            .key(&redis_key)
            .arg(guess)
            .arg(max_attempts)
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;

        let check = interpret(&reply, now)?;
        if check == CodeCheck::Expired {
            conn.del::<_, ()>(&redis_key).await.map_err(backend)?;
        }
        Ok(check)
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> CoreResult<usize> {
        Ok(0)
    }
}
