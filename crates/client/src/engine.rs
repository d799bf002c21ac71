use crate::table::{PendingQuery, QueryCallback, QueryTable};
use crate::wire::{QueryBuilder, ResponseParser, MAX_MESSAGE_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use stubdns_domain::{Answer, QueryOutcome, QueryResult, RecordType, ResolveError};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

pub(crate) enum Command {
    Submit(Submission),
}

pub(crate) struct Submission {
    pub name: String,
    pub qtype: RecordType,
    /// Encoded question message with a zero transaction ID; the real ID is
    /// assigned here, after registration.
    pub request: Vec<u8>,
    pub callback: QueryCallback,
}

enum Event {
    Shutdown,
    Command(Option<Command>),
    Timeout(u16),
    Datagram(std::io::Result<(usize, SocketAddr)>),
}

/// The serialization domain of the client: one task owning the socket, the
/// query table and every timer. Registration, timer arming, send
/// submission, timeout expiry and receive demultiplexing all run here, one
/// at a time, so a reply can never observe a query that is not yet
/// registered and the response/timeout/send-error race resolves to a single
/// terminal outcome.
pub(crate) struct Engine {
    socket: UdpSocket,
    nameserver: SocketAddr,
    table: QueryTable,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
}

impl Engine {
    pub fn new(
        socket: UdpSocket,
        nameserver: SocketAddr,
        timeout: Duration,
        commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            socket,
            nameserver,
            table: QueryTable::new(timeout),
            commands,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut buf = [0u8; MAX_MESSAGE_SIZE];

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => Event::Shutdown,
                command = self.commands.recv() => Event::Command(command),
                Some(id) = self.table.next_timeout() => Event::Timeout(id),
                result = self.socket.recv_from(&mut buf) => Event::Datagram(result),
            };

            match event {
                Event::Shutdown | Event::Command(None) => break,
                Event::Command(Some(Command::Submit(submission))) => {
                    self.dispatch(submission).await;
                }
                Event::Timeout(id) => self.on_timeout(id),
                Event::Datagram(Ok((len, peer))) => self.on_datagram(&buf[..len], peer),
                Event::Datagram(Err(e)) => {
                    if self.shutdown.is_cancelled() {
                        break;
                    }
                    error!(error = %e, "UDP receive failed");
                }
            }
        }

        if !self.table.is_empty() {
            debug!(
                abandoned = self.table.len(),
                "dropping unresolved queries on shutdown"
            );
        }
    }

    /// Registers the query (ID draw + timer arm) and only then submits the
    /// datagram, so the earliest possible reply finds its table entry.
    async fn dispatch(&mut self, submission: Submission) {
        let Submission {
            name,
            qtype,
            mut request,
            callback,
        } = submission;

        let id = self.table.register(name, qtype, callback);
        QueryBuilder::write_id(&mut request, id);

        debug!(id, qtype = %qtype, "query registered");

        match self.socket.send_to(&request, self.nameserver).await {
            Ok(bytes_sent) => {
                debug!(id, server = %self.nameserver, bytes_sent, "UDP query sent");
            }
            Err(e) => {
                error!(id, server = %self.nameserver, error = %e, "UDP send failed");
                if let Some(query) = self.table.claim(id) {
                    deliver(
                        query,
                        QueryResult::Error(ResolveError::SendFailed {
                            server: self.nameserver.to_string(),
                            detail: e.to_string(),
                        }),
                    );
                }
            }
        }
    }

    fn on_timeout(&mut self, id: u16) {
        if let Some(query) = self.table.expire(id) {
            debug!(id, name = %query.name, "query timed out");
            deliver(query, QueryResult::Timeout);
        }
    }

    fn on_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        if peer != self.nameserver {
            warn!(peer = %peer, expected = %self.nameserver, "datagram from unexpected endpoint, dropping");
            return;
        }

        let parsed = match ResponseParser::parse(datagram) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, len = datagram.len(), "dropping undecodable datagram");
                return;
            }
        };

        debug!(
            id = parsed.id,
            qr = parsed.qr,
            aa = parsed.aa,
            tc = parsed.tc,
            rcode = parsed.rcode,
            questions = parsed.qdcount,
            answers = parsed.ancount,
            "reply received"
        );

        let Some(query) = self.table.claim(parsed.id) else {
            debug!(id = parsed.id, "no pending query for reply, dropping");
            return;
        };

        deliver(
            query,
            QueryResult::Success(Answer {
                rcode: parsed.rcode,
                addrs: parsed.addrs,
                cnames: parsed.cnames,
            }),
        );
    }
}

fn deliver(query: PendingQuery, result: QueryResult) {
    (query.callback)(QueryOutcome {
        name: query.name,
        qtype: query.qtype,
        result,
    });
}
