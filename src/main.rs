//! Command line interface for the trendr client. Scans hashtag communities
//! for trending topics, publishes posts, replies, and reactions, looks up
//! profiles, and serves the topic board over HTTP.

mod bolt11;
mod compose;
mod config;
mod event;
mod profile;
mod reactions;
mod relay;
mod server;
mod sign;
mod topics;

use std::{
    fs,
    net::SocketAddr,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use config::Settings;
use relay::{Filter, RelayClient};
use sign::Identity;
use topics::Topic;

/// Command line interface entry point.
#[derive(Parser)]
#[command(
    name = "trendr",
    author,
    version,
    about = "Trending topics for Nostr hashtag communities"
)]
struct Cli {
    /// Path to the `.env` configuration file.
    #[arg(long, default_value = ".env")]
    env: String,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Scan recent community posts and print the trending board.
    Topics {
        /// Ordering for the board.
        #[arg(long, value_enum, default_value_t = SortBy::Posts)]
        by: SortBy,
        /// Show at most this many topics.
        #[arg(long)]
        limit: Option<usize>,
        /// Print the board as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Publish a note, or a community post when --topic is given.
    Post {
        /// Post body.
        content: String,
        /// Hashtag community to post into.
        #[arg(long)]
        topic: Option<String>,
    },
    /// Reply to an event inside a hashtag community.
    Reply {
        /// Event ID of the post being replied to.
        parent: String,
        /// Reply body.
        content: String,
        /// Hashtag community the thread lives in.
        #[arg(long)]
        topic: String,
    },
    /// React to an event.
    React {
        /// Event ID of the reaction target.
        event_id: String,
        /// Reaction content: `+`, `-`, or an emoji.
        #[arg(long, default_value = "+")]
        content: String,
    },
    /// Show the reaction tally for an event.
    Reactions {
        /// Event ID to tally reactions for.
        event_id: String,
    },
    /// Show profile metadata for a public key.
    Profile { pubkey: String },
    /// Serve the topic board over HTTP.
    Serve,
}

/// Board orderings.
#[derive(Clone, Copy, ValueEnum)]
enum SortBy {
    Posts,
    Zaps,
}

/// Execute the selected CLI subcommand.
async fn run(cli: Cli) -> anyhow::Result<()> {
    ensure_env_file(&cli.env)?;
    let cfg = Settings::from_env(&cli.env)?;
    let client = RelayClient::new(
        cfg.relay_search.clone(),
        cfg.tor_socks.clone(),
        cfg.verify_sig,
    );
    match cli.command {
        Commands::Topics { by, limit, json } => {
            let board = topics::scan(&client, &cfg.tuning, std::future::pending()).await?;
            let cap = limit.unwrap_or(cfg.tuning.topic_cap).min(cfg.tuning.topic_cap);
            let ranked = match by {
                SortBy::Posts => topics::top_by_posts(&board, cap),
                SortBy::Zaps => topics::top_by_zaps(&board, cap),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else {
                print_board(&ranked);
            }
        }
        Commands::Post { content, topic } => {
            let identity = identity(&cfg)?;
            let ev = match topic {
                Some(t) => compose::community_post(&identity, &t, &content, now()?)?,
                None => compose::note(&identity, &content, now()?)?,
            };
            let accepted =
                relay::broadcast(&cfg.relays_publish, cfg.tor_socks.as_deref(), &ev).await?;
            println!("published {} to {accepted} relay(s)", ev.id);
        }
        Commands::Reply {
            parent,
            content,
            topic,
        } => {
            let identity = identity(&cfg)?;
            let parent_ev = fetch_event(&client, &parent).await?;
            let ev = compose::reply(&identity, &topic, &parent_ev, &content, now()?)?;
            let accepted =
                relay::broadcast(&cfg.relays_publish, cfg.tor_socks.as_deref(), &ev).await?;
            println!("published {} to {accepted} relay(s)", ev.id);
        }
        Commands::React { event_id, content } => {
            let identity = identity(&cfg)?;
            let target = fetch_event(&client, &event_id).await?;
            let ev = compose::reaction(&identity, &target, &content, now()?)?;
            let accepted =
                relay::broadcast(&cfg.relays_publish, cfg.tor_socks.as_deref(), &ev).await?;
            println!("published {} to {accepted} relay(s)", ev.id);
        }
        Commands::Reactions { event_id } => {
            let events = reactions::fetch_reactions(&client, &event_id).await?;
            let t = reactions::tally(&events);
            println!("likes: {}", t.likes);
            println!("dislikes: {}", t.dislikes);
            for (emoji, count) in &t.emojis {
                println!("{emoji}: {count}");
            }
            if let Some(identity) = cfg.secret_key.as_deref().and_then(|sk| Identity::from_hex(sk).ok()) {
                if let Some(own) = reactions::reaction_of(&events, &identity.pubkey_hex()) {
                    println!("your reaction: {own}");
                }
            }
        }
        Commands::Profile { pubkey } => match profile::fetch_profile(&client, &pubkey).await? {
            Some(p) => {
                println!("{}", p.display(&pubkey));
                if p.bot {
                    println!("bot: yes");
                }
                if let Some(about) = &p.about {
                    println!("about: {about}");
                }
                if let Some(picture) = &p.picture {
                    println!("picture: {picture}");
                }
            }
            None => println!("no profile found for {pubkey}"),
        },
        Commands::Serve => {
            let addr: SocketAddr = cfg.bind_http.as_str().parse()?;
            server::serve_http(addr, client, cfg.tuning.clone(), std::future::pending()).await?;
        }
    }
    Ok(())
}

/// Print the board as an aligned text table.
fn print_board(topics: &[Topic]) {
    if topics.is_empty() {
        println!("no topics found");
        return;
    }
    for t in topics {
        let hot = if t.hot { "  [hot]" } else { "" };
        println!(
            "#{:<24} {:>5} posts {:>10} sats{hot}  {}",
            t.tag, t.post_count, t.zap_volume, t.description
        );
    }
}

/// Signing identity from the configured secret key.
fn identity(cfg: &Settings) -> anyhow::Result<Identity> {
    let sk = cfg
        .secret_key
        .as_deref()
        .context("SECRET_KEY not set; publishing requires a signing key")?;
    Identity::from_hex(sk)
}

/// Current Unix timestamp.
fn now() -> anyhow::Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Fetch a single event by ID from the search relay.
async fn fetch_event(client: &RelayClient, id: &str) -> anyhow::Result<event::Event> {
    let mut filter = Filter::default();
    filter.ids = Some(vec![id.to_string()]);
    filter.limit = Some(1);
    let events = client.fetch(&filter).await?;
    match events.into_iter().find(|ev| ev.id == id) {
        Some(ev) => Ok(ev),
        None => bail!("event {id} not found on {}", client.url()),
    }
}

/// Create a default `.env` file if one is not already present at `path`.
fn ensure_env_file(path: &str) -> anyhow::Result<()> {
    let env_path = Path::new(path);
    if env_path.exists() {
        return Ok(());
    }
    if let Some(parent) = env_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut content = String::new();
    content.push_str("RELAY_SEARCH=wss://relay.ditto.pub\n");
    content.push_str("RELAYS_PUBLISH=wss://relay.ditto.pub,wss://relay.damus.io\n");
    content.push_str("SECRET_KEY=\n");
    content.push_str("TOR_SOCKS=\n");
    content.push_str("BIND_HTTP=127.0.0.1:7077\n");
    content.push_str("VERIFY_SIG=0\n");
    fs::write(env_path, content)?;
    Ok(())
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, Tag, KIND_COMMENT, KIND_PROFILE};
    use futures_util::{SinkExt, StreamExt};
    use crate::config::ENV_MUTEX;
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_tungstenite::{accept_async, tungstenite::Message as TMsg};

    fn clear_env() {
        for v in config::ENV_VARS {
            std::env::remove_var(v);
        }
    }

    fn write_env(dir: &TempDir, extra: &str) -> String {
        let env_path = dir.path().join(".env");
        fs::write(&env_path, extra).unwrap();
        env_path.to_str().unwrap().into()
    }

    fn comment(id: &str, scope: &str) -> Event {
        Event {
            id: id.into(),
            pubkey: "p".into(),
            kind: KIND_COMMENT,
            created_at: 1,
            tags: vec![Tag::new(["I", scope]), Tag::new(["K", "#"])],
            content: String::new(),
            sig: String::new(),
        }
    }

    /// Mock relay that answers REQs with canned events by kind and ACKs
    /// published events.
    async fn mock_relay(posts: Vec<Event>, profiles: Vec<Event>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let posts = posts.clone();
                let profiles = profiles.clone();
                tokio::spawn(async move {
                    let empty: Vec<Event> = vec![];
                    let mut ws = accept_async(stream).await.unwrap();
                    while let Some(Ok(TMsg::Text(txt))) = ws.next().await {
                        let val: serde_json::Value = match serde_json::from_str(&txt) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };
                        match val[0].as_str() {
                            Some("REQ") => {
                                let sub = val[1].as_str().unwrap_or_default().to_string();
                                let events = if val[2]["kinds"][0] == KIND_COMMENT {
                                    &posts
                                } else if val[2]["kinds"][0] == KIND_PROFILE {
                                    &profiles
                                } else {
                                    &empty
                                };
                                for ev in events {
                                    ws.send(TMsg::Text(json!(["EVENT", sub, ev]).to_string()))
                                        .await
                                        .unwrap();
                                }
                                ws.send(TMsg::Text(json!(["EOSE", sub]).to_string()))
                                    .await
                                    .unwrap();
                            }
                            Some("EVENT") => {
                                let id = val[1]["id"].as_str().unwrap_or_default().to_string();
                                ws.send(TMsg::Text(json!(["OK", id, true, ""]).to_string()))
                                    .await
                                    .unwrap();
                            }
                            _ => {}
                        }
                    }
                });
            }
        });
        addr
    }

    #[test]
    fn ensure_env_file_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        let path_str = path.to_str().unwrap();
        ensure_env_file(path_str).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("RELAY_SEARCH=wss://relay.ditto.pub"));
        assert!(content.contains("BIND_HTTP=127.0.0.1:7077"));
        // an existing file is left alone
        fs::write(&path, "RELAY_SEARCH=wss://mine\n").unwrap();
        ensure_env_file(path_str).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "RELAY_SEARCH=wss://mine\n");
    }

    #[tokio::test]
    async fn run_topics_against_mock_relay() {
        let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let addr = mock_relay(vec![comment("aa", "#news")], vec![]).await;
        let dir = TempDir::new().unwrap();
        let env_file = write_env(
            &dir,
            &format!("RELAY_SEARCH=ws://{addr}\nBIND_HTTP=127.0.0.1:0\n"),
        );
        run(Cli {
            env: env_file,
            command: Commands::Topics {
                by: SortBy::Posts,
                limit: None,
                json: true,
            },
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn run_post_requires_secret_key() {
        let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let dir = TempDir::new().unwrap();
        let env_file = write_env(
            &dir,
            "RELAY_SEARCH=ws://127.0.0.1:1\nBIND_HTTP=127.0.0.1:0\n",
        );
        let res = run(Cli {
            env: env_file,
            command: Commands::Post {
                content: "hello".into(),
                topic: None,
            },
        })
        .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn run_post_broadcasts_to_publish_relays() {
        let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let addr = mock_relay(vec![], vec![]).await;
        let dir = TempDir::new().unwrap();
        let env_file = write_env(
            &dir,
            &format!(
                "RELAY_SEARCH=ws://{addr}\nRELAYS_PUBLISH=ws://{addr}\nBIND_HTTP=127.0.0.1:0\nSECRET_KEY={}\n",
                "01".repeat(32)
            ),
        );
        run(Cli {
            env: env_file,
            command: Commands::Post {
                content: "gm #news".into(),
                topic: Some("news".into()),
            },
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn run_profile_prints_metadata() {
        let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let profile_ev = Event {
            id: "pf".into(),
            pubkey: "p1".into(),
            kind: KIND_PROFILE,
            created_at: 1,
            tags: vec![],
            content: r#"{"name":"clawdia","bot":true}"#.into(),
            sig: String::new(),
        };
        let addr = mock_relay(vec![], vec![profile_ev]).await;
        let dir = TempDir::new().unwrap();
        let env_file = write_env(
            &dir,
            &format!("RELAY_SEARCH=ws://{addr}\nBIND_HTTP=127.0.0.1:0\n"),
        );
        run(Cli {
            env: env_file,
            command: Commands::Profile {
                pubkey: "p1".into(),
            },
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn run_reactions_prints_empty_tally() {
        let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let addr = mock_relay(vec![], vec![]).await;
        let dir = TempDir::new().unwrap();
        let env_file = write_env(
            &dir,
            &format!("RELAY_SEARCH=ws://{addr}\nBIND_HTTP=127.0.0.1:0\n"),
        );
        run(Cli {
            env: env_file,
            command: Commands::Reactions {
                event_id: "aa11".into(),
            },
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn run_reply_fetches_parent_and_publishes() {
        let _g = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let parent = comment("aa11", "#news");
        let addr = mock_relay_with_ids(vec![parent]).await;
        let dir = TempDir::new().unwrap();
        let env_file = write_env(
            &dir,
            &format!(
                "RELAY_SEARCH=ws://{addr}\nRELAYS_PUBLISH=ws://{addr}\nBIND_HTTP=127.0.0.1:0\nSECRET_KEY={}\n",
                "01".repeat(32)
            ),
        );
        run(Cli {
            env: env_file,
            command: Commands::Reply {
                parent: "aa11".into(),
                content: "agreed".into(),
                topic: "news".into(),
            },
        })
        .await
        .unwrap();
    }

    /// Mock relay that answers `ids` filters and ACKs published events.
    async fn mock_relay_with_ids(events: Vec<Event>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let events = events.clone();
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    while let Some(Ok(TMsg::Text(txt))) = ws.next().await {
                        let val: serde_json::Value = match serde_json::from_str(&txt) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };
                        match val[0].as_str() {
                            Some("REQ") => {
                                let sub = val[1].as_str().unwrap_or_default().to_string();
                                if let Some(ids) = val[2]["ids"].as_array() {
                                    for ev in events
                                        .iter()
                                        .filter(|ev| ids.iter().any(|id| id == ev.id.as_str()))
                                    {
                                        ws.send(TMsg::Text(
                                            json!(["EVENT", sub, ev]).to_string(),
                                        ))
                                        .await
                                        .unwrap();
                                    }
                                }
                                ws.send(TMsg::Text(json!(["EOSE", sub]).to_string()))
                                    .await
                                    .unwrap();
                            }
                            Some("EVENT") => {
                                let id = val[1]["id"].as_str().unwrap_or_default().to_string();
                                ws.send(TMsg::Text(json!(["OK", id, true, ""]).to_string()))
                                    .await
                                    .unwrap();
                            }
                            _ => {}
                        }
                    }
                });
            }
        });
        addr
    }
}
