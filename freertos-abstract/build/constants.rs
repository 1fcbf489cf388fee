use std::fs::File;
use std::io::{self, Write};

/// Kernel configuration macros whose definitions involve casts or
/// expressions `bindgen` cannot evaluate on its own.
const CONSTANTS: &[&str] = &[
  "configTICK_RATE_HZ",
  "configMINIMAL_STACK_SIZE",
  "configTIMER_TASK_STACK_DEPTH",
  "configMAX_PRIORITIES",
  "configMAX_TASK_NAME_LEN",
  "configTASK_NOTIFICATION_ARRAY_ENTRIES",

  "tskIDLE_PRIORITY",

  "pdFALSE",
  "pdTRUE",
  "pdFAIL",
  "pdPASS",
  "errQUEUE_FULL",
  "errQUEUE_EMPTY",
  "errCOULD_NOT_ALLOCATE_REQUIRED_MEMORY",

  "portMAX_DELAY",

  "taskSCHEDULER_SUSPENDED",
  "taskSCHEDULER_NOT_STARTED",
  "taskSCHEDULER_RUNNING",
];

/// Write a header re-exporting every constant as an enumerator, which
/// clang folds to a plain integer for `bindgen`.
///
/// Each constant `NAME` is available as `RS_NAME` in the bindings.
pub fn write_to_file(f: &mut File) -> io::Result<()> {
  writeln!(f, "#include \"FreeRTOS.h\"")?;
  writeln!(f, "#include \"task.h\"")?;
  writeln!(f, "#include \"timers.h\"")?;
  writeln!(f)?;

  for name in CONSTANTS {
    writeln!(f, "#ifdef {name}")?;
    writeln!(f, "enum {{ RS_{name} = ({name}) }};")?;
    writeln!(f, "#endif")?;
  }

  Ok(())
}
