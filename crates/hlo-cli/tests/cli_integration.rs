//! Integration tests driving the `hlo` binary end to end.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const BRIDGE_PLAN: &str = "\
(!floor-starting 1)
(!place-block stone 0.0 63.0 0.0)
(!place-block stone 1.0 63.0 0.0)
(!floor-finished 1)
(!railing-starting 1)
(!place-block stone 0.0 64.0 0.0)
(!railing-finished 1)
(!railing-starting 1)
(!place-block stone 1.0 64.0 0.0)
(!railing-finished 1)
";

/// Game 1 finishes the bridge, game 2 gives up after one block.
const RECORDS: &str = r#"{"record":"game","id":1,"scenario":"bridge","architect_info":"SimpleArchitect","player_name":"alice"}
{"record":"game","id":2,"scenario":"bridge","architect_info":"SimpleArchitect","player_name":"bob"}
{"record":"log","id":1,"gameid":1,"timestamp":"2020-06-01T12:00:00Z","direction":"PassToClient","message_type":"TextMessage","message":"{\"text\":\"Welcome! Let's build a bridge.\"}"}
{"record":"log","id":2,"gameid":1,"timestamp":"2020-06-01T12:00:01Z","direction":"PassToClient","message_type":"TextMessage","message":"{\"text\":\"{\\\"message\\\":\\\"build the floor\\\",\\\"tree\\\":\\\"(floor)\\\",\\\"new\\\":true}\"}"}
{"record":"log","id":3,"gameid":1,"timestamp":"2020-06-01T12:00:03Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":0,\"y\":63,\"z\":0}"}
{"record":"log","id":4,"gameid":1,"timestamp":"2020-06-01T12:00:05Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":1,\"y\":63,\"z\":0}"}
{"record":"log","id":5,"gameid":1,"timestamp":"2020-06-01T12:00:06Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":5,\"y\":63,\"z\":5}"}
{"record":"log","id":6,"gameid":1,"timestamp":"2020-06-01T12:00:06Z","direction":"PassToClient","message_type":"TextMessage","message":"{\"text\":\"Not there! please remove that block again\"}"}
{"record":"log","id":7,"gameid":1,"timestamp":"2020-06-01T12:00:07Z","direction":"PassFromClient","message_type":"BlockDestroyedMessage","message":"{\"x\":5,\"y\":63,\"z\":5}"}
{"record":"log","id":8,"gameid":1,"timestamp":"2020-06-01T12:00:09Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":0,\"y\":64,\"z\":0}"}
{"record":"log","id":9,"gameid":1,"timestamp":"2020-06-01T12:00:12Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":1,\"y\":64,\"z\":0}"}
{"record":"log","id":10,"gameid":1,"timestamp":"2020-06-01T12:00:12Z","direction":"PassToClient","message_type":"StatusMessage","message":"{\"newGameState\": \"SuccessfullyFinished\"}"}
{"record":"log","id":11,"gameid":2,"timestamp":"2020-06-01T13:00:00Z","direction":"PassToClient","message_type":"TextMessage","message":"{\"text\":\"{\\\"message\\\":\\\"build the floor\\\",\\\"tree\\\":\\\"(floor)\\\",\\\"new\\\":true}\"}"}
{"record":"log","id":12,"gameid":2,"timestamp":"2020-06-01T13:00:04Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":0,\"y\":63,\"z\":0}"}
{"record":"answer","id":1,"gameid":1,"question":"How clear were the instructions?","answer":"4"}
{"record":"answer","id":2,"gameid":1,"question":"Comments","answer":"nice"}
"#;

/// A finished house game; the workspace has no house plan.
const HOUSE_RECORDS: &str = r#"{"record":"game","id":3,"scenario":"house","architect_info":"SimpleArchitect","player_name":"carol"}
{"record":"log","id":13,"gameid":3,"timestamp":"2020-06-01T14:00:00Z","direction":"PassToClient","message_type":"TextMessage","message":"{\"text\":\"{\\\"message\\\":\\\"build a wall\\\",\\\"tree\\\":\\\"(wall)\\\",\\\"new\\\":true}\"}"}
{"record":"log","id":14,"gameid":3,"timestamp":"2020-06-01T14:00:01Z","direction":"PassFromClient","message_type":"BlockPlacedMessage","message":"{\"x\":3,\"y\":63,\"z\":3}"}
{"record":"log","id":15,"gameid":3,"timestamp":"2020-06-01T14:00:02Z","direction":"PassToClient","message_type":"StatusMessage","message":"{\"newGameState\": \"SuccessfullyFinished\"}"}
"#;

/// A temp workspace with config, resources and an output directory.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("resources/domains")).unwrap();
        fs::create_dir_all(root.join("resources/worlds")).unwrap();
        fs::write(root.join("resources/domains/bridge-block.plan"), BRIDGE_PLAN).unwrap();
        fs::write(root.join("resources/worlds/bridge.csv"), "# x,y,z\n0,62,0\n").unwrap();

        let mut config = fs::File::create(root.join("config.toml")).unwrap();
        writeln!(
            config,
            r#"database_path = "{db}"
output_dir = "{out}"
resource_dir = "{res}"
hlo_columns = 3"#,
            db = root.join("hlo.db").display(),
            out = root.join("out").display(),
            res = root.join("resources").display(),
        )
        .unwrap();

        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn hlo(&self, args: &[&str], stdin: Option<&str>) -> Output {
        let mut child = Command::new(env!("CARGO_BIN_EXE_hlo"))
            .arg("--config")
            .arg(self.root().join("config.toml"))
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn hlo");
        {
            let input = child.stdin.as_mut().unwrap();
            input.write_all(stdin.unwrap_or("").as_bytes()).unwrap();
        }
        child.wait_with_output().expect("Failed to wait for hlo")
    }

    fn imported() -> Self {
        let ws = Self::new();
        let output = ws.hlo(&["import"], Some(RECORDS));
        assert_success(&output);
        ws
    }
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "hlo failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_import_reports_counts_and_is_idempotent() {
    let ws = Workspace::new();

    let first = ws.hlo(&["import"], Some(RECORDS));
    assert_success(&first);
    let stderr = String::from_utf8_lossy(&first.stderr);
    assert!(
        stderr.contains("Imported 2 games, 12 log rows, 2 answers"),
        "unexpected import message: {stderr}"
    );

    let second = ws.hlo(&["import"], Some(RECORDS));
    assert_success(&second);
    assert!(String::from_utf8_lossy(&second.stderr).contains("Imported 0 games, 0 log rows, 0 answers"));
}

#[test]
fn test_game_json_contains_hlo_durations() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["game", "1", "--json"], None);
    assert_success(&output);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["successful"], true);
    assert_eq!(json["time_to_success_secs"], 12);
    assert_eq!(json["mistakes"], 1);
    let durations: Vec<i64> = json["hlo"]["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["duration_ms"].as_i64().unwrap())
        .collect();
    assert_eq!(durations, vec![4000, 4000, 3000]);
    assert_eq!(json["hlo"]["total_duration_ms"], 11000);
}

#[test]
fn test_game_markdown_for_unsuccessful_game() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["game", "2"], None);
    assert_success(&output);

    let markdown = stdout(&output);
    assert!(markdown.contains(" - Player name: bob"));
    assert!(markdown.contains(" - Successful: false"));
    assert!(!markdown.contains("Durations per High-level object"));
}

#[test]
fn test_unknown_game_fails() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["game", "99"], None);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("game 99 not found"));
}

#[test]
fn test_csv_has_na_for_unsuccessful_game() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["csv"], None);
    assert_success(&output);

    let csv = stdout(&output);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "# Question0: How clear were the instructions?");
    assert_eq!(
        lines[1],
        "gameid,scenario,architect,wasSuccessful,timeToSuccess,numBlocksPlaced,numBlocksDestroyed,numMistakes,HLO0,HLO1,HLO2,HLOmistakes0,HLOmistakes1,HLOmistakes2,Question0"
    );
    assert_eq!(lines[2], "1,bridge,SimpleArchitect,true,12,5,1,1,4000,4000,3000,0,1,0,4");
    assert_eq!(lines[3], "2,bridge,SimpleArchitect,false,NA,1,0,0,NA,NA,NA,NA,NA,NA,NA");
}

#[test]
fn test_analyze_writes_report_tree() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["analyze"], None);
    assert_success(&output);

    let out = ws.root().join("out");
    for file in [
        "per_game/game-1.md",
        "per_game/game-2.md",
        "per_scenario/scenario-details-bridge.md",
        "per_architect/architect-details-SimpleArchitect.md",
        "bridge-SimpleArchitect.md",
    ] {
        assert!(out.join(file).is_file(), "missing {file}");
    }
    let scenario = fs::read_to_string(out.join("per_scenario/scenario-details-bridge.md")).unwrap();
    assert!(scenario.contains(" - Fraction of successful games: 0.50"));
}

#[test]
fn test_analyze_with_filters_writes_single_report() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["analyze", "--successful"], None);
    assert_success(&output);

    let report = fs::read_to_string(ws.root().join("out/all-all-true.md")).unwrap();
    assert!(report.contains(" - Number of games: 1"));
}

#[test]
fn test_blocks_until_timestamp() {
    let ws = Workspace::imported();

    let output = ws.hlo(&["blocks", "1", "--until", "2020-06-01T12:00:08Z"], None);
    assert_success(&output);

    assert_eq!(
        stdout(&output),
        "Placed Blocks\n - (0, 63, 0)\n - (1, 63, 0)\n - (5, 63, 5)\n\
         Destroyed Blocks\n - (5, 63, 5)\n\
         Present Blocks\n - (0, 63, 0)\n - (1, 63, 0)\n"
    );
}

#[test]
fn test_missing_scenario_plan_only_fails_its_games() {
    let ws = Workspace::imported();
    assert_success(&ws.hlo(&["import"], Some(HOUSE_RECORDS)));

    let output = ws.hlo(&["csv"], None);
    assert_success(&output);
    let csv = stdout(&output);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[2], "1,bridge,SimpleArchitect,true,12,5,1,1,4000,4000,3000,0,1,0,4");
    assert_eq!(lines[4], "3,house,SimpleArchitect,true,2,1,0,0,NA,NA,NA,NA,NA,NA,NA");

    let output = ws.hlo(&["analyze"], None);
    assert_success(&output);
    let out = ws.root().join("out");
    let bridge = fs::read_to_string(out.join("per_game/game-1.md")).unwrap();
    assert!(bridge.contains(" - floor : 4000ms (0 mistakes)"), "{bridge}");
    let house = fs::read_to_string(out.join("per_game/game-3.md")).unwrap();
    assert!(house.contains(" - analysis failed: failed to read"), "{house}");
    assert!(house.contains("house-highlevel.plan"), "{house}");
}
