use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

use walkdir::WalkDir;

/// Heap implementation selected by the `heap_N` features, `heap_4` if none is.
pub fn heap() -> PathBuf {
  let selected = (1..=5)
    .filter(|i| env::var(format!("CARGO_FEATURE_HEAP_{i}")).is_ok())
    .collect::<Vec<_>>();

  match selected.as_slice() {
    [] => "heap_4.c".into(),
    [i] => format!("heap_{i}.c").into(),
    _ => {
      let features = selected.iter().map(|i| format!("`heap_{i}`")).collect::<Vec<_>>().join(", ");
      eprintln!("Features {features} are mutually exclusive.");
      exit(1);
    },
  }
}

/// Port directory below `portable/` for the compilation target.
pub fn port() -> PathBuf {
  let target = env::var("TARGET").unwrap_or_default();
  let target_family = env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();

  match (target.as_str(), target_family.as_str()) {
    ("thumbv6m-none-eabi", _) => Path::new("GCC").join("ARM_CM0"),
    ("thumbv7m-none-eabi" | "thumbv7em-none-eabi", _) => Path::new("GCC").join("ARM_CM3"),
    ("thumbv7em-none-eabihf", _) => Path::new("GCC").join("ARM_CM4F"),
    ("thumbv8m.main-none-eabi" | "thumbv8m.main-none-eabihf", _) => {
      Path::new("GCC").join("ARM_CM33_NTZ").join("non_secure")
    },
    (t, _) if t.starts_with("riscv32") => Path::new("GCC").join("RISC-V"),
    (_, "unix") => Path::new("ThirdParty").join("GCC").join("Posix"),
    (_, "windows") => PathBuf::from("MSVC-MingW"),
    _ => {
      eprintln!("Target '{}' is not supported.", target);
      exit(1);
    }
  }
}

/// Find `.c` files in `dir`, descending at most `depth` levels.
pub fn find_c_files(dir: impl AsRef<Path>, depth: Option<usize>) -> Result<Vec<PathBuf>, walkdir::Error> {
  let mut walker = WalkDir::new(dir).follow_links(false);

  if let Some(depth) = depth {
    walker = walker.max_depth(depth);
  }

  let mut c_files = Vec::new();
  for entry in walker {
    let entry = entry?;
    if entry.path().extension().map_or(false, |ext| ext == "c") {
      c_files.push(entry.into_path());
    }
  }

  Ok(c_files)
}

/// Prepare a C compiler for the kernel sources and a matching `bindgen` builder.
pub fn builders(
  source: impl AsRef<Path>,
  config: impl AsRef<Path>,
) -> (cc::Build, bindgen::Builder) {
  let source = source.as_ref();
  let config = config.as_ref();

  let include = source.join("include");
  let port = source.join("portable").join(port());
  let heap = source.join("portable").join("MemMang").join(heap());

  let mut c_files = find_c_files(source, Some(1)).unwrap_or_else(|err| {
    eprintln!("Failed listing kernel sources: {}", err);
    exit(1);
  });
  c_files.extend(find_c_files(&port, None).unwrap_or_else(|err| {
    eprintln!("Failed listing port sources: {}", err);
    exit(1);
  }));
  c_files.push(heap);

  let mut cc = cc::Build::new();
  let mut bindgen = bindgen::builder()
    .use_core()
    .ctypes_prefix("::core::ffi")
    .parse_callbacks(Box::new(bindgen::CargoCallbacks));

  cc.define("RUST", None);
  bindgen = bindgen.clang_arg("-DRUST");

  for c_file in c_files {
    log::debug!("compiling {}", c_file.display());
    cc.file(c_file);
  }

  for include in [include, port, config.to_path_buf()] {
    cc.include(&include);
    bindgen = bindgen.clang_arg(format!("-I{}", include.display()));
  }

  (cc, bindgen)
}
