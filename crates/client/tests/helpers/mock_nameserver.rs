#![allow(dead_code)]
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// How the mock answers each query it receives.
#[derive(Clone)]
pub enum Behavior {
    AnswerA(Ipv4Addr),
    AnswerAaaa(Ipv6Addr),
    CnameChain {
        canonical: &'static str,
        addr: Ipv4Addr,
    },
    NxDomain,
    Silent,
    /// Replies with a valid answer, but from a different socket than the
    /// one the client is talking to.
    SpoofedSource(Ipv4Addr),
}

/// A scripted nameserver on a plain std socket + thread, so it can serve a
/// client that owns its own runtime. Records every query it receives.
pub struct MockNameserver {
    socket: Arc<UdpSocket>,
    addr: SocketAddr,
    behavior: Arc<Mutex<Behavior>>,
    seen: Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MockNameserver {
    pub fn start(behavior: Behavior) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let behavior = Arc::new(Mutex::new(behavior));
        let seen: Arc<Mutex<Vec<(Vec<u8>, SocketAddr)>>> = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let socket = socket.clone();
            let behavior = behavior.clone();
            let seen = seen.clone();
            let running = running.clone();

            std::thread::spawn(move || {
                let mut buf = [0u8; 512];
                while running.load(Ordering::Relaxed) {
                    let (len, peer) = match socket.recv_from(&mut buf) {
                        Ok(received) => received,
                        Err(_) => continue,
                    };
                    let query = buf[..len].to_vec();
                    seen.lock().unwrap().push((query.clone(), peer));

                    let behavior = behavior.lock().unwrap().clone();
                    match behavior {
                        Behavior::Silent => {}
                        Behavior::AnswerA(ip) => {
                            let _ = socket.send_to(&a_response(&query, ip), peer);
                        }
                        Behavior::AnswerAaaa(ip) => {
                            let _ = socket.send_to(&aaaa_response(&query, ip), peer);
                        }
                        Behavior::CnameChain { canonical, addr } => {
                            let _ = socket.send_to(&cname_response(&query, canonical, addr), peer);
                        }
                        Behavior::NxDomain => {
                            let _ = socket.send_to(&response_header(&query, 3, 0), peer);
                        }
                        Behavior::SpoofedSource(ip) => {
                            let other = UdpSocket::bind("127.0.0.1:0").unwrap();
                            let _ = other.send_to(&a_response(&query, ip), peer);
                        }
                    }
                }
            })
        };

        Self {
            socket,
            addr,
            behavior,
            seen,
            running,
            thread: Some(thread),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn query_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Answers the most recently seen query from the server socket, for
    /// exercising replies that arrive after the client gave up. Waits for a
    /// query to have been seen.
    pub fn send_late_answer(&self, ip: Ipv4Addr) {
        for _ in 0..100 {
            if let Some((query, peer)) = self.seen.lock().unwrap().last().cloned() {
                self.socket.send_to(&a_response(&query, ip), peer).unwrap();
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("no query was ever received");
    }
}

impl Drop for MockNameserver {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Response header + echoed question, QR/RD/RA set and the given RCODE.
fn response_header(query: &[u8], rcode: u8, ancount: u16) -> Vec<u8> {
    let mut response = Vec::with_capacity(512);
    response.extend_from_slice(&query[0..2]);
    response.push(0x81);
    response.push(0x80 | rcode);
    response.extend_from_slice(&query[4..6]);
    response.extend_from_slice(&ancount.to_be_bytes());
    response.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    response.extend_from_slice(&query[12..]);
    response
}

fn a_response(query: &[u8], ip: Ipv4Addr) -> Vec<u8> {
    let mut response = response_header(query, 0, 1);
    response.extend_from_slice(&[
        0xc0, 0x0c, // owner: pointer to the question name
        0x00, 0x01, // TYPE A
        0x00, 0x01, // CLASS IN
        0x00, 0x00, 0x00, 0x3c, // TTL
        0x00, 0x04, // RDLENGTH
    ]);
    response.extend_from_slice(&ip.octets());
    response
}

fn aaaa_response(query: &[u8], ip: Ipv6Addr) -> Vec<u8> {
    let mut response = response_header(query, 0, 1);
    response.extend_from_slice(&[
        0xc0, 0x0c, 0x00, 0x1c, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3c, 0x00, 0x10,
    ]);
    response.extend_from_slice(&ip.octets());
    response
}

/// `qname CNAME canonical` plus `canonical A addr`, with the A record's
/// owner compressed as a pointer into the CNAME RDATA.
fn cname_response(query: &[u8], canonical: &str, addr: Ipv4Addr) -> Vec<u8> {
    let mut response = response_header(query, 0, 2);
    let rdata = encode_name(canonical);
    let rdata_offset = query.len() + 12;

    response.extend_from_slice(&[0xc0, 0x0c, 0x00, 0x05, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3c]);
    response.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
    response.extend_from_slice(&rdata);

    response.extend_from_slice(&[
        0xc0 | (rdata_offset >> 8) as u8,
        rdata_offset as u8,
        0x00,
        0x01,
        0x00,
        0x01,
        0x00,
        0x00,
        0x00,
        0x3c,
        0x00,
        0x04,
    ]);
    response.extend_from_slice(&addr.octets());
    response
}

fn encode_name(name: &str) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(name.len() + 2);
    for label in name.split('.') {
        encoded.push(label.len() as u8);
        encoded.extend_from_slice(label.as_bytes());
    }
    encoded.push(0);
    encoded
}
