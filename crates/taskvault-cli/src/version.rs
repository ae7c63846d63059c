pub const FULL: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+git.",
    env!("TASKVAULT_GIT_COUNT"),
    ".",
    env!("TASKVAULT_GIT_SHA"),
    env!("TASKVAULT_GIT_DIRTY")
);
