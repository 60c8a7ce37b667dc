use std::fs;

use steward_lib::applier::{Applier, JobApplier};

use super::common::{TestEnv, job, package};

#[test]
fn apply_and_configure_job_with_packages() {
  let env = TestEnv::new();
  let agent = env.agent();
  let ruby = package("ruby", "3.3", env.store(&[("bin/ruby", "#!/bin/sh\necho ruby")]));
  let web = job(
    "web",
    "1",
    env.store(&[
      ("bin/web_ctl", "#!/bin/sh"),
      ("monit", "check process web"),
      ("worker.monit", "check process worker"),
    ]),
    vec![ruby],
  );

  agent.job_applier().apply(&web).unwrap();
  agent.job_applier().configure(&web, 0).unwrap();

  let base = env.base();
  let job_dir = base.join("jobs").join("web");
  assert!(job_dir.join("bin").join("web_ctl").is_file());
  assert!(job_dir.join("packages").join("ruby").join("bin").join("ruby").is_file());
  assert!(base.join("sys").join("log").join("web").is_dir());
  assert!(base.join("sys").join("run").join("web").is_dir());
  assert!(base.join("data").join("web").is_dir());

  let monit = base.join("monit").join("job");
  assert_eq!(fs::read_to_string(monit.join("0000_web.monitrc")).unwrap(), "check process web");
  assert_eq!(
    fs::read_to_string(monit.join("0000_web_worker.monitrc")).unwrap(),
    "check process worker"
  );
}

#[test]
fn upgrade_then_keep_only_removes_old_version() {
  let env = TestEnv::new();
  let agent = env.agent();
  let v1 = job("web", "1", env.store(&[("VERSION", "1")]), vec![]);
  let v2 = job("web", "2", env.store(&[("VERSION", "2")]), vec![]);

  agent.job_applier().apply(&v1).unwrap();
  agent.job_applier().apply(&v2).unwrap();
  agent.job_applier().keep_only(&[v2.clone()]).unwrap();

  let job_dir = env.base().join("jobs").join("web");
  assert_eq!(fs::read_to_string(job_dir.join("VERSION")).unwrap(), "2");
  let installed: Vec<_> = fs::read_dir(env.base().join("data").join("jobs").join("web"))
    .unwrap()
    .collect();
  assert_eq!(installed.len(), 1);
}

#[test]
fn keep_only_with_no_jobs_removes_everything() {
  let env = TestEnv::new();
  let agent = env.agent();
  let web = job("web", "1", env.store(&[("monit", "check")]), vec![]);
  agent.job_applier().apply(&web).unwrap();

  agent.job_applier().keep_only(&[]).unwrap();
  // Repeating the reconciliation is a no-op.
  agent.job_applier().keep_only(&[]).unwrap();

  assert!(fs::symlink_metadata(env.base().join("jobs").join("web")).is_err());
  assert_eq!(
    fs::read_dir(env.base().join("data").join("jobs").join("web")).unwrap().count(),
    0
  );
}

#[test]
fn root_package_keep_only_uninstalls_stale_packages() {
  let env = TestEnv::new();
  let agent = env.agent();
  let ruby = package("ruby", "3.3", env.store(&[("bin/ruby", "ruby")]));
  let go = package("go", "1.22", env.store(&[("bin/go", "go")]));

  agent.package_applier().apply(&ruby).unwrap();
  agent.package_applier().apply(&go).unwrap();
  agent.package_applier().keep_only(&[go.clone()]).unwrap();

  let packages = env.base().join("packages");
  assert!(fs::symlink_metadata(packages.join("ruby")).is_err());
  assert!(packages.join("go").join("bin").join("go").is_file());
  assert_eq!(
    fs::read_dir(env.base().join("data").join("packages").join("ruby")).unwrap().count(),
    0
  );
}

#[test]
fn delete_source_blobs_removes_job_blobs() {
  let env = TestEnv::new();
  let agent = env.agent();
  let web = job("web", "1", env.store(&[("monit", "check")]), vec![]);
  let blob_id = web.source.blobstore_id.clone();
  agent.job_applier().apply(&web).unwrap();

  agent.job_applier().delete_source_blobs(&[web.clone(), web.clone()]).unwrap();

  assert!(!env.blob_exists(&blob_id));
  // Installed content outlives its source blob.
  assert!(env.base().join("jobs").join("web").join("monit").is_file());
}

#[test]
fn corrupt_blob_fails_apply_without_installing() {
  let env = TestEnv::new();
  let agent = env.agent();
  let mut web = job("web", "1", env.store(&[("monit", "check")]), vec![]);
  web.source.digest = "0000000000000000000000000000000000000000".to_string();

  let err = agent.job_applier().apply(&web).unwrap_err();

  assert!(err.to_string().starts_with("Getting job source from blobstore"));
  assert!(fs::symlink_metadata(env.base().join("jobs").join("web")).is_err());
}
