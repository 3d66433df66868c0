//! In-process RESP server covering the commands `RedisBackend` sends.
//!
//! `drop_connections` closes every open client socket while the listener
//! keeps accepting, which looks like a Redis restart to the client.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

type Published = broadcast::Sender<(String, String)>;

#[derive(Default)]
struct Keyspace {
    lists: HashMap<String, VecDeque<String>>,
    strings: HashMap<String, String>,
}

pub struct FakeRedis {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    disconnect: broadcast::Sender<()>,
    acceptor: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (disconnect, _) = broadcast::channel(4);
        let (published, _) = broadcast::channel(64);
        let keyspace = Arc::new(Mutex::new(Keyspace::default()));

        let acceptor = tokio::spawn({
            let accepted = accepted.clone();
            let disconnect = disconnect.clone();
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(
                        socket,
                        keyspace.clone(),
                        published.clone(),
                        disconnect.subscribe(),
                    ));
                }
            }
        });

        Self {
            addr,
            accepted,
            disconnect,
            acceptor,
        }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Connections accepted since start, including reconnects.
    pub fn connections_accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn drop_connections(&self) {
        let _ = self.disconnect.send(());
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.acceptor.abort();
        self.drop_connections();
    }
}

async fn serve(
    socket: TcpStream,
    keyspace: Arc<Mutex<Keyspace>>,
    published: Published,
    mut disconnect: broadcast::Receiver<()>,
) {
    let (read, mut write) = socket.into_split();

    // Parsing runs in its own task so a pushed message never interrupts a
    // half-read command
    let (command_tx, mut commands) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        let mut read = BufReader::new(read);
        while let Some(args) = read_command(&mut read).await {
            if command_tx.send(args).is_err() {
                break;
            }
        }
    });

    let mut messages = published.subscribe();
    let mut channels = HashSet::new();
    loop {
        let reply = tokio::select! {
            _ = disconnect.recv() => break,
            command = commands.recv() => match command {
                Some(args) => Some(execute(&args, &keyspace, &published, &mut channels)),
                None => break,
            },
            message = messages.recv() => match message {
                Ok((channel, payload)) if channels.contains(&channel) => {
                    Some(array(&[bulk("message"), bulk(&channel), bulk(&payload)]))
                }
                _ => None,
            },
        };
        if let Some(reply) = reply {
            if write.write_all(reply.as_bytes()).await.is_err() {
                break;
            }
        }
    }
    reader.abort();
}

async fn read_command<R: AsyncBufRead + Unpin>(read: &mut R) -> Option<Vec<String>> {
    let mut line = String::new();
    if read.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        read.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut value = vec![0; len + 2];
        read.read_exact(&mut value).await.ok()?;
        value.truncate(len);
        args.push(String::from_utf8(value).ok()?);
    }
    Some(args)
}

fn execute(
    args: &[String],
    keyspace: &Mutex<Keyspace>,
    published: &Published,
    channels: &mut HashSet<String>,
) -> String {
    let Some((name, rest)) = args.split_first() else {
        return "-ERR empty command\r\n".to_string();
    };
    let mut keyspace = keyspace.lock().unwrap();

    match name.to_ascii_uppercase().as_str() {
        "LPUSH" => {
            let list = keyspace.lists.entry(rest[0].clone()).or_default();
            for value in &rest[1..] {
                list.push_front(value.clone());
            }
            integer(list.len())
        }
        // Never blocks; an empty list answers like an expired timeout
        "BRPOP" => match keyspace.lists.get_mut(&rest[0]).and_then(VecDeque::pop_back) {
            Some(value) => array(&[bulk(&rest[0]), bulk(&value)]),
            None => "*-1\r\n".to_string(),
        },
        "SET" => {
            let nx = rest.iter().any(|arg| arg.eq_ignore_ascii_case("NX"));
            if nx && keyspace.strings.contains_key(&rest[0]) {
                "$-1\r\n".to_string()
            } else {
                keyspace.strings.insert(rest[0].clone(), rest[1].clone());
                "+OK\r\n".to_string()
            }
        }
        "GET" => keyspace
            .strings
            .get(&rest[0])
            .map_or_else(|| "$-1\r\n".to_string(), |value| bulk(value)),
        "PUBLISH" => {
            let receivers = published
                .send((rest[0].clone(), rest[1].clone()))
                .unwrap_or(0);
            integer(receivers)
        }
        "SUBSCRIBE" => rest
            .iter()
            .map(|channel| {
                channels.insert(channel.clone());
                format!(
                    "*3\r\n{}{}{}",
                    bulk("subscribe"),
                    bulk(channel),
                    integer(channels.len())
                )
            })
            .collect(),
        "PING" => "+PONG\r\n".to_string(),
        // CLIENT SETINFO on connect, and anything else we do not model
        _ => "+OK\r\n".to_string(),
    }
}

fn bulk(value: &str) -> String {
    format!("${}\r\n{}\r\n", value.len(), value)
}

fn integer(value: usize) -> String {
    format!(":{value}\r\n")
}

fn array(items: &[String]) -> String {
    format!("*{}\r\n{}", items.len(), items.concat())
}
