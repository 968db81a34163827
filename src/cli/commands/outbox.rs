use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("outbox-poll-seconds")
                .long("outbox-poll-seconds")
                .help("Message outbox poll interval in seconds")
                .env("ROADWATCH_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("outbox-batch-size")
                .long("outbox-batch-size")
                .help("Message outbox batch size per poll")
                .env("ROADWATCH_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("outbox-max-attempts")
                .long("outbox-max-attempts")
                .help("Max attempts before marking a message as failed")
                .env("ROADWATCH_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("outbox-backoff-base-seconds")
                .long("outbox-backoff-base-seconds")
                .help("Base delay for message outbox retry backoff")
                .env("ROADWATCH_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("outbox-backoff-max-seconds")
                .long("outbox-backoff-max-seconds")
                .help("Max delay for message outbox retry backoff")
                .env("ROADWATCH_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
