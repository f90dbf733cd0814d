//! Lua bodies run server-side via `EVALSHA`. Kept as plain string
//! constants — there's no templating, just `KEYS`/`ARGV` positions shared
//! with the call sites in `lib.rs`.

/// `KEYS = [state_key, opened_at_key]`, `ARGV = [now, open_duration_secs]`.
/// Flips `open` to `half_open` once the open window has elapsed; otherwise
/// a pure read.
pub const CHECK_STATE: &str = r#"
local state = redis.call('GET', KEYS[1]) or 'closed'
if state == 'open' then
  local opened_at = tonumber(redis.call('GET', KEYS[2])) or 0
  local now = tonumber(ARGV[1])
  local open_duration = tonumber(ARGV[2])
  if now - opened_at >= open_duration then
    redis.call('SET', KEYS[1], 'half_open')
    return 'half_open'
  end
  return 'open'
end
return state
"#;

/// `KEYS = [state_key, failures_key]`. A success in `half_open` closes the
/// breaker and clears the failure counter; a success in `closed` just
/// resets the counter. A success recorded while `open` is a caller bug
/// (calls should have been rejected) and is a no-op.
pub const ON_SUCCESS: &str = r#"
local state = redis.call('GET', KEYS[1]) or 'closed'
if state == 'open' then
  return 'open'
end
redis.call('SET', KEYS[1], 'closed')
redis.call('DEL', KEYS[2])
return 'closed'
"#;

/// `KEYS = [state_key, failures_key, opened_at_key]`, `ARGV = [threshold,
/// now]`. A failure while `half_open` reopens the breaker immediately
/// (the probe failed). A failure while `closed` increments the counter
/// and trips once it reaches `threshold`.
pub const ON_FAILURE: &str = r#"
local state = redis.call('GET', KEYS[1]) or 'closed'
if state == 'half_open' then
  redis.call('SET', KEYS[1], 'open')
  redis.call('SET', KEYS[3], ARGV[2])
  return 'open'
end
local failures = redis.call('INCR', KEYS[2])
local threshold = tonumber(ARGV[1])
if failures >= threshold then
  redis.call('SET', KEYS[1], 'open')
  redis.call('SET', KEYS[3], ARGV[2])
  return 'open'
end
return state
"#;
