use std::env;
use std::fs::File;
use std::path::PathBuf;
use std::process::exit;

use bindgen::callbacks::{IntKind, ParseCallbacks};

mod build;
mod constants;

#[derive(Debug)]
struct Callbacks;

impl ParseCallbacks for Callbacks {
  fn item_name(&self, name: &str) -> Option<String> {
    Some(match name {
      "pcTaskGetTaskName" => "pcTaskGetName",
      "pcTimerGetTimerName" => "pcTimerGetName",
      _ => return None
    }.to_owned())
  }

  fn int_macro(&self, name: &str, value: i64) -> Option<IntKind> {
    if name == "configSUPPORT_STATIC_ALLOCATION" && value == 0 && env::var("CARGO_FEATURE_STATIC_ALLOCATION").is_ok() {
      log::warn!("feature `static_allocation` is enabled but `configSUPPORT_STATIC_ALLOCATION` is 0");
      println!("cargo:warning=`static_allocation` requires `configSUPPORT_STATIC_ALLOCATION = 1`");
    }

    None
  }
}

// See: https://doc.rust-lang.org/cargo/reference/build-scripts.html
fn main() {
  stderrlog::new().module(module_path!()).verbosity(2).init().ok();

  println!("cargo:rerun-if-changed=build");
  println!("cargo:rerun-if-changed=src/freertos/shim.c");
  println!("cargo:rerun-if-env-changed=FREERTOS_SRC");
  println!("cargo:rerun-if-env-changed=FREERTOS_CONFIG");
  println!("cargo:rustc-check-cfg=cfg(freertos_kernel)");

  let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
  let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
  let shim_dir = manifest_dir.join("src/freertos");
  println!("cargo:SHIM={}", shim_dir.display());

  let freertos_source = if let Ok(freertos_source) = env::var("FREERTOS_SRC") {
    PathBuf::from(freertos_source)
  } else {
    log::info!("FREERTOS_SRC is not set, using the hosted kernel");
    println!("cargo:warning=FREERTOS_SRC is not set, building against the hosted kernel");
    return
  };

  let freertos_config = if let Ok(freertos_config) = env::var("FREERTOS_CONFIG") {
    PathBuf::from(freertos_config)
  } else {
    eprintln!("FREERTOS_CONFIG must point to the directory containing FreeRTOSConfig.h");
    exit(1);
  };

  let constants = out_dir.join("constants.h");
  let mut f = File::create(&constants).unwrap();
  constants::write_to_file(&mut f).unwrap();

  let (mut cc, bindgen) = build::builders(freertos_source, freertos_config);

  cc.file(shim_dir.join("shim.c"));

  if let Err(err) = cc.try_compile("freertos") {
    eprintln!("Compilation failed: {}", err);
    exit(1);
  }

  let bindings = out_dir.join("shim.rs");

  bindgen
    .header(shim_dir.join("shim.c").display().to_string())
    .header(constants.display().to_string())
    .generate_comments(false)
    .parse_callbacks(Box::new(Callbacks))
    .generate().unwrap_or_else(|err| {
      eprintln!("Failed generating bindings: {}", err);
      exit(1);
    })
    .write_to_file(&bindings).unwrap_or_else(|err| {
      eprintln!("Failed writing bindings: {}", err);
      exit(1);
    });

  log::info!("generated bindings at {}", bindings.display());
  println!("cargo:rustc-cfg=freertos_kernel");
}
