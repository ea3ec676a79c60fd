//! End-to-end scenarios over real TCP connections.

mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use common::TestFs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use nfswire::client::{ClientError, NfsClient, ProcedureCall};
use nfswire::correlator::ProcedureReply;
use nfswire::nfs3::{FileHandle, NfsResult, NFS_PROGRAM};
use nfswire::parser;
use nfswire::quiesce::QuiesceController;
use nfswire::rpc::{AcceptedStatus, CallHeader, FragmentHeader, OpaqueAuth, ReplyBody};
use nfswire::server::Server;
use nfswire::serializer;
use nfswire::vfs::ReadArgs;

async fn start_server(fs: TestFs) -> (std::net::SocketAddr, Arc<QuiesceController>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(Arc::new(fs));
    let controller = server.controller();
    let task = tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });
    (addr, controller, task)
}

fn record(body: Vec<u8>) -> Vec<u8> {
    let mut wire = FragmentHeader::new(body.len() as u32, true).to_wire().to_be_bytes().to_vec();
    wire.extend_from_slice(&body);
    wire
}

async fn read_record(stream: &mut TcpStream) -> Bytes {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.unwrap();
    let header = FragmentHeader::from_wire(u32::from_be_bytes(header));
    assert!(header.last);
    let mut body = BytesMut::zeroed(header.length as usize);
    stream.read_exact(&mut body).await.unwrap();
    body.freeze()
}

#[tokio::test]
async fn mount_then_read_over_tcp() {
    let (addr, _controller, _task) = start_server(TestFs::new()).await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = NfsClient::new(stream);

    match client.call(&ProcedureCall::Mount("/".to_string())).await.unwrap() {
        ProcedureReply::Mount(NfsResult::Ok(ok)) => {
            assert_eq!(ok.handle.to_id(), Some(common::FILE_ID))
        }
        other => panic!("unexpected {other:?}"),
    }

    let read = ProcedureCall::Read(ReadArgs {
        handle: FileHandle::from_id(common::FILE_ID),
        offset: 0,
        count: 16,
    });
    match client.call(&read).await.unwrap() {
        ProcedureReply::Read(NfsResult::Ok(ok)) => {
            assert_eq!(ok.count, 16);
            assert!(ok.eof);
            assert_eq!(ok.data, Bytes::from_static(common::FILE_CONTENT));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.outstanding(), 0);
}

#[tokio::test]
async fn unknown_procedure_keeps_the_connection_open() {
    let (addr, _controller, _task) = start_server(TestFs::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut body = Vec::new();
    serializer::rpc::call_header(
        &mut body,
        &CallHeader {
            xid: 21,
            program: NFS_PROGRAM,
            version: 3,
            procedure: 255,
            credentials: OpaqueAuth::none(),
            verifier: OpaqueAuth::none(),
        },
    )
    .unwrap();
    stream.write_all(&record(body)).await.unwrap();

    let reply = read_record(&mut stream).await;
    let header = parser::rpc::reply_header(&mut Cursor::new(reply.as_ref())).unwrap();
    assert_eq!(header.xid, 21);
    match header.body {
        ReplyBody::Accepted { status: AcceptedStatus::ProcedureUnavailable, .. } => {}
        other => panic!("unexpected {other:?}"),
    }

    // The connection survives: a NULL call still gets answered.
    let mut body = Vec::new();
    serializer::rpc::call_header(
        &mut body,
        &CallHeader {
            xid: 22,
            program: NFS_PROGRAM,
            version: 3,
            procedure: 0,
            credentials: OpaqueAuth::none(),
            verifier: OpaqueAuth::none(),
        },
    )
    .unwrap();
    stream.write_all(&record(body)).await.unwrap();

    let reply = read_record(&mut stream).await;
    let header = parser::rpc::reply_header(&mut Cursor::new(reply.as_ref())).unwrap();
    assert_eq!(header.xid, 22);
    assert!(matches!(
        header.body,
        ReplyBody::Accepted { status: AcceptedStatus::Success, .. }
    ));
}

#[tokio::test]
async fn pipelined_replies_arrive_in_completion_order() {
    let fs = TestFs { read_delay: Some(Duration::from_millis(300)), ..TestFs::new() };
    let (addr, _controller, _task) = start_server(fs).await;
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = NfsClient::new(stream);

    let read_xid = client
        .send_call(&ProcedureCall::Read(ReadArgs {
            handle: FileHandle::from_id(common::FILE_ID),
            offset: 0,
            count: 4,
        }))
        .await
        .unwrap();
    let attr_xid = client
        .send_call(&ProcedureCall::GetAttr(FileHandle::from_id(common::FILE_ID)))
        .await
        .unwrap();
    assert_eq!(client.outstanding(), 2);

    // GETATTR finishes first even though READ was called first.
    let (first_xid, first) = client.recv_reply().await.unwrap();
    assert_eq!(first_xid, attr_xid);
    assert!(matches!(first, ProcedureReply::GetAttr(NfsResult::Ok(_))));

    let (second_xid, second) = client.recv_reply().await.unwrap();
    assert_eq!(second_xid, read_xid);
    match second {
        ProcedureReply::Read(NfsResult::Ok(ok)) => assert_eq!(ok.data, &b"ABCD"[..]),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn malformed_call_closes_the_connection() {
    let (addr, _controller, _task) = start_server(TestFs::new()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // rpc version 3 in the envelope.
    let mut body = Vec::new();
    serializer::u32(&mut body, 1).unwrap(); // xid
    serializer::u32(&mut body, 0).unwrap(); // CALL
    serializer::u32(&mut body, 3).unwrap(); // bad rpc version
    serializer::u32(&mut body, NFS_PROGRAM).unwrap();
    serializer::u32(&mut body, 3).unwrap();
    serializer::u32(&mut body, 0).unwrap();
    stream.write_all(&record(body)).await.unwrap();

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn quiesce_drains_two_connections_and_completes_once() {
    let (addr, controller, serve_task) = start_server(TestFs::new()).await;

    let mut first = NfsClient::new(TcpStream::connect(addr).await.unwrap());
    let mut second = NfsClient::new(TcpStream::connect(addr).await.unwrap());
    first.call(&ProcedureCall::NfsNull).await.unwrap();
    second.call(&ProcedureCall::NfsNull).await.unwrap();

    let done = controller.initiate_shutdown();
    tokio::time::timeout(Duration::from_secs(5), done)
        .await
        .expect("shutdown should complete")
        .unwrap();

    // Both connections were closed by the server.
    assert!(matches!(first.recv_reply().await, Err(ClientError::Closed)));
    assert!(matches!(second.recv_reply().await, Err(ClientError::Closed)));

    // The acceptor task has returned.
    tokio::time::timeout(Duration::from_secs(5), serve_task)
        .await
        .expect("acceptor should stop")
        .unwrap();

    // A later shutdown request resolves immediately.
    controller.initiate_shutdown().await.unwrap();
}
