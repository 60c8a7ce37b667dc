#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;

use steward_lib::bundle::{Bundle, BundleCollection, BundleContext, BundleDefinition, FileBundleCollection};
use steward_lib::compiler::{CompileError, CompilePackage, CompileRequest, Compiler, sort_for_compilation};
use steward_lib::models::Source;
use steward_lib::platform::{OsFileSystem, RetryPolicy, SystemClock};
use steward_lib::util::hash::{DigestAlgorithm, hash_file};

use super::common::{TestEnv, package};

fn compile_package(env: &TestEnv, name: &str, files: &[(&str, &str)]) -> CompilePackage {
  CompilePackage {
    name: name.to_string(),
    version: "1.0".to_string(),
    source: env.store(files),
    ..CompilePackage::default()
  }
}

fn root_packages(env: &TestEnv) -> FileBundleCollection {
  let dirs = env.config.dirs();
  let ctx = BundleContext {
    fs: Arc::new(OsFileSystem),
    clock: Arc::new(SystemClock),
    retry: RetryPolicy::Once,
    ownership: None,
  };
  FileBundleCollection::new(dirs.data_dir(), dirs.base_dir(), "packages", 0o755, ctx)
}

#[test]
fn compile_round_trip_leaves_bundle_uninstalled() {
  let env = TestEnv::new();
  let agent = env.agent();
  let ruby = compile_package(
    &env,
    "ruby",
    &[
      (
        "packaging",
        "echo \"compiled $BOSH_PACKAGE_NAME $BOSH_PACKAGE_VERSION\" > \"$BOSH_INSTALL_TARGET/out.txt\"",
      ),
      ("src/ruby.c", "int main;"),
    ],
  );

  let compiled = agent.compiler().compile(&ruby, &[]).unwrap();

  let unpacked = env.unpack(&compiled.blob_id);
  assert_eq!(fs::read_to_string(unpacked.join("out.txt")).unwrap().trim(), "compiled ruby 1.0");

  let archive = env.blob_dir().join(&compiled.blob_id);
  assert_eq!(hash_file(&archive, DigestAlgorithm::Sha1).unwrap(), compiled.digest);

  let bundle = root_packages(&env).get(&BundleDefinition::new("ruby", "1.0")).unwrap();
  assert!(!bundle.is_installed().unwrap());
  assert!(fs::symlink_metadata(env.base().join("packages").join("ruby")).is_err());

  let log = env.base().join("data").join("sys").join("log").join("compilation");
  assert!(log.join("packaging.stdout.log").is_file());
  assert!(log.join("packaging.stderr.log").is_file());
}

#[test]
fn dependencies_are_available_during_packaging() {
  let env = TestEnv::new();
  let agent = env.agent();
  let libyaml = package("libyaml", "0.2", env.store(&[("lib/libyaml.so", "elf")]));
  let enabled_dep = env.base().join("packages").join("libyaml").join("lib").join("libyaml.so");
  let script = format!(
    "test -f '{dep}' && cp '{dep}' \"$BOSH_INSTALL_TARGET/\"",
    dep = enabled_dep.display()
  );
  let ruby = compile_package(&env, "ruby", &[("packaging", &script)]);

  let compiled = agent.compiler().compile(&ruby, &[libyaml]).unwrap();

  assert!(env.unpack(&compiled.blob_id).join("libyaml.so").is_file());
  assert!(fs::symlink_metadata(env.base().join("packages").join("libyaml")).is_err());
}

#[test]
fn failing_packaging_script_aborts_without_upload() {
  let env = TestEnv::new();
  let agent = env.agent();
  let broken = compile_package(&env, "broken", &[("packaging", "echo nope >&2; exit 7")]);
  let blobs_before = fs::read_dir(env.blob_dir()).unwrap().count();

  let err = agent.compiler().compile(&broken, &[]).unwrap_err();

  assert!(matches!(err, CompileError::Runner { .. }));
  assert!(err.to_string().contains("nope"));
  assert_eq!(fs::read_dir(env.blob_dir()).unwrap().count(), blobs_before);
}

#[test]
fn batch_compiles_in_dependency_order() {
  let env = TestEnv::new();
  let agent = env.agent();
  let lib = compile_package(&env, "lib", &[("packaging", "echo lib > \"$BOSH_INSTALL_TARGET/lib.txt\"")]);
  let app_requires = env.base().join("packages").join("lib").join("lib.txt");
  let app_script = format!("cat '{}' > \"$BOSH_INSTALL_TARGET/app.txt\"", app_requires.display());
  let app = compile_package(&env, "app", &[("packaging", &app_script)]);

  let requests = sort_for_compilation(vec![
    CompileRequest {
      package: app,
      dependencies: vec![package("lib", "1.0", Default::default())],
    },
    CompileRequest {
      package: lib,
      dependencies: vec![],
    },
  ])
  .unwrap();

  let mut compiled: BTreeMap<String, String> = BTreeMap::new();
  for request in requests {
    // Dependencies are consumed in their compiled form.
    let dependencies = request
      .dependencies
      .iter()
      .map(|dep| {
        let blob = &compiled[&dep.name];
        let mut dep = dep.clone();
        dep.source = Source {
          digest: String::new(),
          blobstore_id: blob.clone(),
          ..Default::default()
        };
        dep
      })
      .collect::<Vec<_>>();
    let result = agent.compiler().compile(&request.package, &dependencies).unwrap();
    compiled.insert(request.package.name.clone(), result.blob_id);
  }

  let app_out = env.unpack(&compiled["app"]).join("app.txt");
  assert_eq!(fs::read_to_string(app_out).unwrap().trim(), "lib");
}
