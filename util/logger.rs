// Copyright 2018-2026 the module_runtime authors. MIT license.

//! An `env_logger`-based `init()` helper, in the style of the
//! teacher's CLI logger (`cli/lib/util/logger.rs`), simplified: this
//! crate has no OpenTelemetry console-replacement concern, so there is
//! no `CliLogger` wrapper around `env_logger::Logger` here, just a
//! configured builder installed directly. Installing a logger is an
//! application concern this library never does on its own behalf.

/// Installs an `env_logger`-backed global logger reading the
/// `MODULE_RUNTIME_LOG` environment variable (falling back to `level`
/// when unset), matching the teacher's non-standard env-var-prefix
/// convention (`DENO_LOG` rather than `RUST_LOG`) so multiple crates'
/// loggers don't fight over the same variable in an embedding process.
pub fn init(level: log::LevelFilter) {
  let mut builder = env_logger::Builder::from_env(
    env_logger::Env::new()
      .filter_or("MODULE_RUNTIME_LOG", level.to_string())
      .write_style("MODULE_RUNTIME_LOG_STYLE"),
  );
  builder.format(|buf, record| {
    use std::io::Write;
    if record.level() <= log::Level::Info {
      writeln!(buf, "{}", record.args())
    } else {
      writeln!(
        buf,
        "{} {} - {}",
        record.level(),
        record.target(),
        record.args()
      )
    }
  });
  let _ = builder.try_init();
}
