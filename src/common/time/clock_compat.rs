pub(crate) type Instant = std::time::Instant;
