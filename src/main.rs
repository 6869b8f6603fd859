use battle_replay::{
    env::Settings,
    errors::{ReplayResult, ToReplayError},
    metrics, Bootstrapper, CombatantView, EventSource, HistoryEventSource, HttpMetadataProvider,
    JsonLinesObserver, LoggerManager, MatchContext, MatchReplaySession, ReplayObserver,
    SseEventSource, StreamConnection, StreamTermination, TracingObserver,
};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(
    name = "battle_replay",
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,
)]
struct Args {
    /// 관전할 매치 ID
    #[arg(long = "match-id", required = true)]
    match_id: String,

    /// Overrides `api.base_url` from the configuration.
    #[arg(long = "base-url")]
    base_url: Option<String>,

    /// Replay the recorded event history instead of the live stream.
    #[arg(long)]
    history: bool,

    /// Print updates as JSON lines on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct FinalSnapshot<'a> {
    context: &'a MatchContext,
    combatants: Vec<CombatantView>,
    termination: &'a StreamTermination,
}

async fn open_source(
    args: &Args,
    http: &reqwest::Client,
    settings: &Settings,
) -> ReplayResult<Box<dyn EventSource>> {
    if args.history {
        let source = HistoryEventSource::fetch(http, &settings.api, &args.match_id).await?;
        info!("Replaying {} recorded events", source.remaining());
        Ok(Box::new(source))
    } else {
        let source = SseEventSource::connect(http, &settings.api, &args.match_id).await?;
        Ok(Box::new(source))
    }
}

#[tokio::main]
async fn main() -> ReplayResult<()> {
    let args = Args::parse();

    // 1. 환경변수 로드
    dotenv::dotenv().ok();

    // 2. 설정 파일 로드
    let mut settings = Settings::new()?;
    if let Some(base_url) = &args.base_url {
        settings.api.base_url = base_url.clone();
    }

    // 3. 로거 초기화
    let _logger_manager = LoggerManager::setup(&settings);

    // 4. Metrics 초기화
    let metrics_registry = prometheus::Registry::new();
    metrics::register_custom_metrics(&metrics_registry)
        .to_replay_error("Failed to register custom metrics")?;

    // 5. Shutdown token (Ctrl+C -> 관전 종료)
    let shutdown_token = CancellationToken::new();
    {
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received. Closing replay...");
                token.cancel();
            }
        });
    }

    let mut observer: Box<dyn ReplayObserver> = if args.json {
        Box::new(JsonLinesObserver::stdout())
    } else {
        Box::new(TracingObserver)
    };

    // 6. Bootstrap (스트림 열기 전에 반드시 완료)
    let provider = HttpMetadataProvider::new(settings.api.clone());
    let http = provider.client().clone();
    let bootstrapper = Bootstrapper::new(provider, settings.replay.clone());
    let mut session = MatchReplaySession::bootstrap(
        &bootstrapper,
        &args.match_id,
        &settings.replay,
        observer.as_mut(),
    )
    .await?;

    // 7. 이벤트 스트림 소비
    let termination = match open_source(&args, &http, &settings).await {
        Ok(source) => {
            let mut conn = StreamConnection::new(args.match_id.clone(), source);
            session
                .run_until_cancelled(&mut conn, observer.as_mut(), shutdown_token)
                .await
        }
        Err(e) if e.is_transport() => {
            error!("Failed to open event stream for match {}: {}", args.match_id, e);
            let termination = StreamTermination::TransportError(e.to_string());
            observer.on_stream_terminated(&termination);
            termination
        }
        Err(e) => return Err(e),
    };

    // 8. 최종 스냅샷 출력
    let snapshot = FinalSnapshot {
        context: session.context(),
        combatants: session.snapshot(),
        termination: &termination,
    };
    if args.json {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    // 9. Metrics dump
    let exposition = metrics::encode_metrics(&metrics_registry)
        .to_replay_error("Failed to encode metrics")?;
    debug!("Replay metrics:\n{}", exposition);

    Ok(())
}
