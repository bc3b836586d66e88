pub(crate) type Instant = quanta::Instant;
