use std::fs;
use std::os::unix::fs::PermissionsExt;

use predicates::prelude::*;

use crate::common::TestEnv;

#[test]
fn earlier_package_wins_collision() {
  let env = TestEnv::new();
  let a = env.add_package("pkg-a", &["x", "y"]);
  let b = env.add_package("pkg-b", &["y", "z"]);
  let profile = env.path("profile");

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "pkg-a pkg-b", "--profile-dir"])
    .arg(&profile)
    .assert()
    .success()
    .stdout(predicate::str::contains("Materialization complete"))
    .stdout(predicate::str::contains("Binaries linked: 3"))
    .stderr(predicate::str::contains("keeping the earlier one"));

  assert_eq!(fs::read_link(profile.join("x")).unwrap(), a.join("bin/x"));
  assert_eq!(fs::read_link(profile.join("y")).unwrap(), a.join("bin/y"));
  assert_eq!(fs::read_link(profile.join("z")).unwrap(), b.join("bin/z"));
  assert_eq!(fs::read_dir(&profile).unwrap().count(), 3);
}

#[test]
fn reversed_order_flips_winner() {
  let env = TestEnv::new();
  env.add_package("pkg-a", &["x", "y"]);
  let b = env.add_package("pkg-b", &["y", "z"]);
  let profile = env.path("profile");

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "pkg-b,pkg-a", "--profile-dir"])
    .arg(&profile)
    .assert()
    .success();

  assert_eq!(fs::read_link(profile.join("y")).unwrap(), b.join("bin/y"));
}

#[test]
fn docs_only_package_gives_empty_profile() {
  let env = TestEnv::new();
  env.add_docs_package("docs-only-pkg");
  let profile = env.path("profile");

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "docs-only-pkg", "--profile-dir"])
    .arg(&profile)
    .assert()
    .success()
    .stdout(predicate::str::contains("Binaries linked: 0"));

  assert!(profile.is_dir());
  assert_eq!(fs::read_dir(&profile).unwrap().count(), 0);
  assert_eq!(fs::metadata(&profile).unwrap().permissions().mode() & 0o777, 0o755);
}

#[test]
fn unknown_package_produces_nothing() {
  let env = TestEnv::new();
  env.add_package("pkg-a", &["x"]);
  let profile = env.path("profile");
  let list = env.path("closure.txt");
  let root = env.path("export");

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "pkg-a missing-pkg", "--profile-dir"])
    .arg(&profile)
    .arg("--closure-list")
    .arg(&list)
    .arg("--closure-root")
    .arg(&root)
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not provide attribute 'missing-pkg'"));

  assert!(!profile.exists());
  assert!(!list.exists());
  assert!(!root.exists());
}

#[test]
fn failed_export_leaves_nothing_behind() {
  let env = TestEnv::new();
  env.add_package("pkg-a", &["x"]);
  let profile = env.path("profile");
  let list = env.path("closure.txt");
  let blocker = env.path("blocker");
  fs::write(&blocker, "not a directory").unwrap();

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "pkg-a", "--profile-dir"])
    .arg(&profile)
    .arg("--closure-list")
    .arg(&list)
    .arg("--closure-root")
    .arg(blocker.join("export"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to export closure"));

  assert!(!profile.exists());
  assert!(!list.exists());
  let staged: Vec<_> = fs::read_dir(env.root())
    .unwrap()
    .map(|e| e.unwrap().file_name())
    .filter(|name| name.to_string_lossy().starts_with('.'))
    .collect();
  assert!(staged.is_empty(), "staging paths left behind: {:?}", staged);
}

#[test]
fn existing_profile_dir_is_rejected() {
  let env = TestEnv::new();
  env.add_package("pkg-a", &["x"]);
  let profile = env.path("profile");
  fs::create_dir_all(&profile).unwrap();

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "pkg-a", "--profile-dir"])
    .arg(&profile)
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));

  assert_eq!(fs::read_dir(&profile).unwrap().count(), 0);
}

#[test]
fn closure_is_listed_and_exported() {
  let env = TestEnv::new();
  let a = env.add_package("pkg-a", &["x"]);
  let profile = env.path("profile");
  let list = env.path("closure.txt");
  let root = env.path("export");

  env
    .yadt()
    .args(["materialize", "--no-base", "-p", "pkg-a", "--profile-dir"])
    .arg(&profile)
    .arg("--closure-list")
    .arg(&list)
    .arg("--closure-root")
    .arg(&root)
    .assert()
    .success()
    .stdout(predicate::str::contains("Closure paths: 2"));

  let glibc = env.store_path().join("glibc");
  let listed = fs::read_to_string(&list).unwrap();
  let mut expected = vec![a.display().to_string(), glibc.display().to_string()];
  expected.sort();
  assert_eq!(listed.lines().collect::<Vec<_>>(), expected);

  let exported = root.join(a.strip_prefix("/").unwrap());
  assert_eq!(fs::read_to_string(exported.join("bin/x")).unwrap(), "#!/bin/sh\necho x\n");
  assert!(root.join(glibc.strip_prefix("/").unwrap()).join("lib/libc.so.6").is_file());
}

#[test]
fn json_report() {
  let env = TestEnv::new();
  let a = env.add_package("pkg-a", &["x", "y"]);
  env.add_package("pkg-b", &["y"]);
  let profile = env.path("profile");

  let assert = env
    .yadt()
    .args(["--output", "json", "materialize", "--no-base", "-p", "pkg-a pkg-b", "--profile-dir"])
    .arg(&profile)
    .assert()
    .success();

  let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();

  assert_eq!(report["outputs"].as_array().unwrap().len(), 2);
  assert_eq!(
    report["profile"]["entries"]["y"]["source"],
    serde_json::json!(a.join("bin/y"))
  );
  assert_eq!(report["profile"]["collisions"][0]["name"], "y");
  assert!(report["export"].is_null());
}
