// A poisoned lock means another thread panicked in the middle of a pool
// operation, so the pool's bookkeeping may be inconsistent (we panic).
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution \
    is not safe because the pool statistics can no longer be trusted to match its contents";
