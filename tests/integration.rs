use std::path::Path;
use std::process::{Command, Output};

const CART: &str = "src/main/java/com/shop/Cart.java";
const CHECKOUT: &str = "src/main/java/com/shop/Checkout.java";

/// Copy `tests/fixtures/<fixture>` into a fresh temp directory.
fn workspace(fixture: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    copy_tree(&Path::new("tests/fixtures").join(fixture), dir.path());
    dir
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

/// Turn `dir` into a git repository with everything committed.
fn commit_all(dir: &Path, message: &str) {
    if !dir.join(".git").exists() {
        git(dir, &["init", "-q"]);
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", message]);
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(["-c", "user.name=Test User", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn edit(dir: &Path, file: &str, from: &str, to: &str) {
    let path = dir.join(file);
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains(from), "{file} does not contain {from}");
    std::fs::write(path, content.replace(from, to)).unwrap();
}

fn testimpact(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_testimpact"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "testimpact failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn position_prints_decoded_patterns() {
    let dir = workspace("shop");
    let output = testimpact(dir.path(), &["select", "--position", "com,shop,Cart,add"]);
    assert_eq!(
        stdout(&output),
        "com,shop,CartTest,addsItem\ncom,shop,CartTest,totalsItems\n"
    );
}

#[test]
fn unknown_position_prints_nothing() {
    let dir = workspace("shop");
    let output = testimpact(dir.path(), &["select", "--position", "com,shop,Cart,remove"]);
    assert_eq!(stdout(&output), "");
}

#[test]
fn lookup_prints_raw_entry() {
    let dir = workspace("shop");
    let output = testimpact(dir.path(), &["lookup", "com.shop.Checkout.pay"]);
    assert_eq!(stdout(&output), "com-shop-CheckoutTest-pays\n");

    let missing = testimpact(dir.path(), &["lookup", "com.shop.Checkout.refund"]);
    assert_eq!(missing.status.code(), Some(1));
    assert!(missing.stdout.is_empty(), "nothing on stdout for a missing key");
}

#[test]
fn missing_index_is_reported() {
    let dir = workspace("shop");
    let output = testimpact(dir.path(), &["--index", "nope.index", "lookup", "com.shop.Cart.add"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Index Unavailable"), "stderr: {stderr}");
}

#[test]
fn scan_selects_tests_of_changed_methods() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    edit(dir.path(), CART, "sum += price;", "sum += price * 2;");

    let output = testimpact(dir.path(), &["select"]);
    assert_eq!(
        stdout(&output),
        "com,shop,CartTest,addsItem\ncom,shop,CartTest,totalsItems\n"
    );

    let output = testimpact(dir.path(), &["select", "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "patterns": ["com,shop,CartTest,addsItem", "com,shop,CartTest,totalsItems"]
        })
    );
}

#[test]
fn clean_tree_selects_nothing() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    let output = testimpact(dir.path(), &["select"]);
    assert_eq!(stdout(&output), "");
}

#[test]
fn changelist_is_a_revision() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    edit(dir.path(), CHECKOUT, "> 0", ">= 0");
    commit_all(dir.path(), "free checkout");

    let output = testimpact(dir.path(), &["select", "--changelist", "HEAD~1"]);
    assert_eq!(stdout(&output), "com,shop,CheckoutTest,pays\n");

    let output = testimpact(dir.path(), &["select"]);
    assert_eq!(stdout(&output), "", "nothing pending against HEAD");

    let output = testimpact(dir.path(), &["select", "--changelist", "no-such-branch"]);
    assert_eq!(stdout(&output), "", "stale change list selects nothing");
}

#[test]
fn methods_lists_changed_methods() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    edit(dir.path(), CART, "return sum;", "return sum + count;");

    let output = testimpact(dir.path(), &["methods"]);
    assert_eq!(stdout(&output), format!("{CART}: com.shop.Cart.total\n"));
}

#[test]
fn deleting_a_method_leaves_its_neighbours_unselected() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    edit(
        dir.path(),
        CART,
        "    public void add(int price) {\n        count += 1;\n        sum += price;\n    }\n\n",
        "",
    );

    assert_eq!(stdout(&testimpact(dir.path(), &["methods"])), "");
    assert_eq!(stdout(&testimpact(dir.path(), &["select"])), "");
}

#[test]
fn moved_file_is_diffed_against_its_old_path() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    let moved = "src/main/java/com/shop/Till.java";
    git(dir.path(), &["mv", CHECKOUT, moved]);

    assert_eq!(stdout(&testimpact(dir.path(), &["select"])), "", "a pure move changes nothing");

    edit(dir.path(), moved, "> 0", ">= 0");
    assert_eq!(
        stdout(&testimpact(dir.path(), &["methods"])),
        format!("{moved}: com.shop.Checkout.pay\n")
    );
    assert_eq!(stdout(&testimpact(dir.path(), &["select"])), "com,shop,CheckoutTest,pays\n");
}

#[test]
fn parallel_scan_matches_sequential() {
    let dir = workspace("shop");
    commit_all(dir.path(), "base");
    edit(dir.path(), CHECKOUT, "> 0", ">= 0");
    edit(dir.path(), CART, "count += 1;", "count += 2;");

    let sequential = stdout(&testimpact(dir.path(), &["select"]));
    let parallel = stdout(&testimpact(dir.path(), &["--jobs", "4", "select"]));
    assert_eq!(parallel, sequential);
    assert_eq!(
        sequential,
        "com,shop,CartTest,addsItem\ncom,shop,CartTest,totalsItems\ncom,shop,CheckoutTest,pays\n"
    );
}

#[test]
fn malformed_config_fails() {
    let dir = workspace("shop");
    std::fs::write(dir.path().join(".testimpact.toml"), "jobs = \"many\"").unwrap();
    let output = testimpact(dir.path(), &["select", "--position", "com,shop,Cart,add"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid TOML"), "stderr: {stderr}");
}
