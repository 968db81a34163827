use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("public-base-url")
                .long("public-base-url")
                .help("Public base URL embedded in verification links")
                .env("ROADWATCH_PUBLIC_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new("frontend-origin")
                .long("frontend-origin")
                .help("Frontend origin allowed by CORS")
                .env("ROADWATCH_FRONTEND_ORIGIN")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("OTP TTL in seconds (citizen and authority login codes)")
                .env("ROADWATCH_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("verify-token-ttl-seconds")
                .long("verify-token-ttl-seconds")
                .help("Authority email verification token TTL in seconds")
                .env("ROADWATCH_VERIFY_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("captcha-verify-url")
                .long("captcha-verify-url")
                .help("Remote CAPTCHA verification endpoint; accepts every challenge when unset")
                .env("ROADWATCH_CAPTCHA_VERIFY_URL"),
        )
}
