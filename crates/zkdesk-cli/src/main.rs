use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use zkdesk_engine::{Executor, HashCommitBackend, ProofSystem, SystemSeedSource};
use zkdesk_panel::{
    export_params, import_params_file, PresentationUpdate, Session, SessionUpdate,
};
use zkdesk_proto::{CircuitFamily, PanelId};

#[derive(Parser)]
#[command(name = "zkdesk", version, about = "Offloaded zk proof workbench")]
struct Cli {
    /// Directory for exported .zkp artifacts (defaults to the zkdesk data dir)
    #[arg(long)]
    out_dir: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Drive the discrete-log and tree panels concurrently through
    /// generate, prove and verify
    Demo {
        /// Tree circuit depth, captured when generate is issued
        #[arg(long, default_value_t = 8)]
        depth: u32,
        /// Hex scalar to prove knowledge of
        #[arg(long, default_value = "5")]
        x: String,
    },
    /// Generate params, export them to a file, import into a fresh panel
    /// and prove/verify there
    Roundtrip {
        #[arg(long, default_value = "dl")]
        panel: String,
        #[arg(long, default_value = "5")]
        x: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    zkdesk_util::init_tracing()?;
    let cli = Cli::parse();
    let out_dir = cli
        .out_dir
        .as_deref()
        .map(zkdesk_util::expand_user)
        .unwrap_or_else(zkdesk_util::artifacts_dir);

    match cli.cmd {
        Cmd::Demo { depth, x } => run_demo(depth, &x).await,
        Cmd::Roundtrip { panel, x } => run_roundtrip(&panel, &x, &out_dir).await,
    }
}

/// Spawn the executor with the built-in backend behind a short simulated
/// module load, so the readiness gate is observable from the terminal.
fn spawn_session() -> Session {
    let backend: Arc<dyn ProofSystem> = Arc::new(HashCommitBackend::new());
    let loader = async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        backend
    };
    let (handle, msgs, _task) = Executor::spawn(loader, Arc::new(SystemSeedSource));
    Session::new(handle, msgs)
}

async fn wait_ready(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    while let Some(update) = session.next_update().await {
        match update {
            SessionUpdate::ExecutorReady => return Ok(()),
            SessionUpdate::Panel(update) => render(&update),
        }
    }
    Err("executor terminated before becoming ready".into())
}

async fn run_demo(depth: u32, x: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = spawn_session();
    let dl = PanelId::from("dl");
    let tree = PanelId::new(format!("tree-{depth}"));
    session.open_panel(dl.clone(), CircuitFamily::DiscreteLog);
    session
        .open_panel(tree.clone(), CircuitFamily::Tree)
        .set_depth_input(depth);

    println!("loading proving backend...");
    wait_ready(&mut session).await?;
    println!("backend ready");

    // Both panels go pending at once; responses land in whatever order the
    // executor finishes them.
    session.generate(&dl).await?;
    session.generate(&tree).await?;

    let mut verified = 0;
    while verified < 2 {
        let Some(update) = session.next_update().await else {
            return Err("executor terminated mid-session".into());
        };
        let SessionUpdate::Panel(update) = update else {
            continue;
        };
        render(&update);
        match update {
            PresentationUpdate::GenerateOk { panel, .. } => {
                session.prove(&panel, x).await?;
            }
            PresentationUpdate::ProveOk { panel, .. } => {
                session.verify(&panel, None, None).await?;
            }
            PresentationUpdate::VerifyOk { .. } => verified += 1,
            PresentationUpdate::OperationFailed { panel, kind, message } => {
                return Err(format!("{panel}: {kind} failed: {message}").into());
            }
        }
    }

    println!("--- session summary ---");
    for id in [&dl, &tree] {
        let Some(ctrl) = session.panel(id) else { continue };
        let size_kb = ctrl.params().map(|p| p.size_kb()).unwrap_or(0);
        let proof_len = ctrl.proof().map(str::len).unwrap_or(0);
        println!(
            "{id}: params {size_kb}kb, proof {proof_len} hex chars, h={}, verified={}",
            ctrl.derived_value().unwrap_or("-"),
            ctrl.verify_status()
                .map(|ok| ok.to_string())
                .unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

async fn run_roundtrip(
    panel: &str,
    x: &str,
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = spawn_session();
    let source = PanelId::from(panel);
    session.open_panel(source.clone(), CircuitFamily::DiscreteLog);

    println!("loading proving backend...");
    wait_ready(&mut session).await?;

    session.generate(&source).await?;
    loop {
        match session.next_update().await {
            Some(SessionUpdate::Panel(update @ PresentationUpdate::GenerateOk { .. })) => {
                render(&update);
                break;
            }
            Some(SessionUpdate::Panel(PresentationUpdate::OperationFailed {
                panel,
                kind,
                message,
            })) => return Err(format!("{panel}: {kind} failed: {message}").into()),
            Some(_) => continue,
            None => return Err("executor terminated mid-session".into()),
        }
    }

    let path = {
        let ctrl = session
            .panel(&source)
            .ok_or_else(|| format!("panel {source} disappeared"))?;
        export_params(ctrl, out_dir)?
    };
    println!("exported {}", path.display());

    let copy = PanelId::new(format!("{source}-import"));
    let ctrl = session.open_panel(copy.clone(), CircuitFamily::DiscreteLog);
    let update = import_params_file(ctrl, &path)?;
    render(&update);

    let exported = session.panel(&source).and_then(|c| c.params().cloned());
    let imported = session.panel(&copy).and_then(|c| c.params().cloned());
    if exported != imported {
        return Err("imported params differ from exported params".into());
    }
    println!("imported params are byte-identical");

    session.prove(&copy, x).await?;
    loop {
        let Some(update) = session.next_update().await else {
            return Err("executor terminated mid-session".into());
        };
        let SessionUpdate::Panel(update) = update else {
            continue;
        };
        render(&update);
        match update {
            PresentationUpdate::ProveOk { panel, .. } => {
                session.verify(&panel, None, None).await?;
            }
            PresentationUpdate::VerifyOk { accepted, .. } => {
                if !accepted {
                    return Err("verification rejected a freshly produced proof".into());
                }
                return Ok(());
            }
            PresentationUpdate::OperationFailed { panel, kind, message } => {
                return Err(format!("{panel}: {kind} failed: {message}").into());
            }
            PresentationUpdate::GenerateOk { .. } => {}
        }
    }
}

fn render(update: &PresentationUpdate) {
    match update {
        PresentationUpdate::GenerateOk {
            panel,
            size_kb,
            params_placeholder,
            depth,
        } => {
            match depth {
                Some(depth) => println!(
                    "{panel}: params generated, size: {size_kb}kb (depth {depth}); prove/verify inputs: {params_placeholder}"
                ),
                None => println!(
                    "{panel}: params generated, size: {size_kb}kb; prove/verify inputs: {params_placeholder}"
                ),
            }
        }
        PresentationUpdate::ProveOk { panel, proof, h } => {
            println!("{panel}: h={h}");
            println!("{panel}: proof={proof}");
        }
        PresentationUpdate::VerifyOk { panel, accepted } => {
            println!("{panel}: verify result: {accepted}");
        }
        PresentationUpdate::OperationFailed { panel, kind, message } => {
            println!("{panel}: {kind} error: {message}");
        }
    }
}
