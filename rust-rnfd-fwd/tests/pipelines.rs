//! Pipeline behaviors beyond the reflexive exchange: NACK propagation,
//! Data fan-out to multiple matched entries, Dead-Nonce-List loop
//! suppression, scope control, and face cleanup.

use rust_rnfd_common::packet::{Data, Interest, Nack, NackReason, Packet};
use rust_rnfd_common::types::{FaceId, FaceScope, LinkType};
use rust_rnfd_common::Name;
use rust_rnfd_fwd::fw::{Forwarder, ForwarderOptions, UnsolicitedDataPolicy};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

struct TestFace {
    id: FaceId,
    rx: UnboundedReceiver<Packet>,
}

fn add_face(fw: &mut Forwarder, scope: FaceScope, link_type: LinkType) -> TestFace {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = fw.add_face(format!("test://{:?}", scope), scope, link_type, tx);
    TestFace { id, rx }
}

fn name(uri: &str) -> Name {
    Name::from_uri(uri).unwrap()
}

fn recv_interest(face: &mut TestFace) -> Interest {
    match face.rx.try_recv().expect("expected a packet") {
        Packet::Interest(interest) => interest,
        other => panic!("expected Interest, got {:?}", other),
    }
}

fn recv_data(face: &mut TestFace) -> Data {
    match face.rx.try_recv().expect("expected a packet") {
        Packet::Data(data) => data,
        other => panic!("expected Data, got {:?}", other),
    }
}

fn recv_nack(face: &mut TestFace) -> Nack {
    match face.rx.try_recv().expect("expected a packet") {
        Packet::Nack(nack) => nack,
        other => panic!("expected Nack, got {:?}", other),
    }
}

fn assert_quiet(face: &mut TestFace) {
    assert!(matches!(face.rx.try_recv(), Err(TryRecvError::Empty)));
}

#[test]
fn upstream_nack_propagates_least_severe_to_downstream() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let mut consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut producer = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/example"), producer.id, 10);

    let interest = Interest::new(name("/example/x")).with_nonce(5);
    fw.handle_packet(consumer.id, Packet::Interest(interest));
    let forwarded = recv_interest(&mut producer);

    // the only upstream NACKs; the reason reaches the downstream
    fw.handle_packet(
        producer.id,
        Packet::Nack(Nack::new(forwarded, NackReason::NoRoute)),
    );
    let nack = recv_nack(&mut consumer);
    assert_eq!(nack.reason, NackReason::NoRoute);
    assert_eq!(fw.metrics.n_in_nacks.value(), 1);

    // the outgoing NACK consumed the in-record
    let entry = fw.pit_find_based_on_name(&name("/example/x")).unwrap();
    assert!(entry.in_record(consumer.id).is_none());
}

#[test]
fn nack_with_wrong_nonce_is_dropped() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let mut consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut producer = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/example"), producer.id, 10);

    let interest = Interest::new(name("/example/x")).with_nonce(5);
    fw.handle_packet(consumer.id, Packet::Interest(interest));
    let mut forwarded = recv_interest(&mut producer);

    forwarded.nonce = forwarded.nonce.wrapping_add(1);
    fw.handle_packet(
        producer.id,
        Packet::Nack(Nack::new(forwarded, NackReason::Congestion)),
    );
    assert_quiet(&mut consumer);
}

#[test]
fn no_route_nacks_the_consumer() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let mut consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);

    fw.handle_packet(consumer.id, Packet::Interest(Interest::new(name("/nowhere")).with_nonce(1)));
    let nack = recv_nack(&mut consumer);
    assert_eq!(nack.reason, NackReason::NoRoute);
}

/// Invariant: with several matched entries, each distinct pending
/// downstream receives the Data exactly once, and never the ingress face.
#[test]
fn data_fans_out_once_per_downstream() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let mut consumer1 = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut consumer2 = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut producer = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/example"), producer.id, 10);

    // two entries that will both match the Data: a prefix Interest and an
    // exact one
    let broad = Interest::new(name("/example"))
        .with_nonce(1)
        .with_can_be_prefix(true);
    fw.handle_packet(consumer1.id, Packet::Interest(broad));
    recv_interest(&mut producer);

    let exact = Interest::new(name("/example/doc")).with_nonce(2);
    fw.handle_packet(consumer2.id, Packet::Interest(exact));
    recv_interest(&mut producer);

    fw.handle_packet(
        producer.id,
        Packet::Data(Data::new(name("/example/doc"), "payload")),
    );

    assert_eq!(recv_data(&mut consumer1).name, name("/example/doc"));
    assert_eq!(recv_data(&mut consumer2).name, name("/example/doc"));
    assert_quiet(&mut consumer1);
    assert_quiet(&mut consumer2);
    assert_quiet(&mut producer);
    assert_eq!(fw.metrics.n_out_data.value(), 2);
}

/// Invariant: Nonces of an unsatisfied entry enter the Dead Nonce List on
/// finalization, and a late loop-back is dropped (NACK on p2p).
#[test]
fn dead_nonce_list_suppresses_late_loopbacks() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let mut consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut producer = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/example"), producer.id, 10);

    let interest = Interest::new(name("/example/lost"))
        .with_nonce(77)
        .with_lifetime(Duration::from_millis(100));
    fw.handle_packet(consumer.id, Packet::Interest(interest));
    let forwarded = recv_interest(&mut producer);
    assert_eq!(forwarded.nonce, 77);

    // no Data arrives; the entry expires unsatisfied
    fw.poll_timers(Instant::now() + Duration::from_millis(200));
    assert_eq!(fw.pit.len(), 0);
    assert_eq!(fw.metrics.n_unsatisfied_interests.value(), 1);

    // the looped-back Interest with the dead Nonce is refused
    let looped = Interest::new(name("/example/lost")).with_nonce(77);
    fw.handle_packet(producer.id, Packet::Interest(looped));
    let nack = recv_nack(&mut producer);
    assert_eq!(nack.reason, NackReason::Duplicate);
    assert_quiet(&mut consumer);
}

#[test]
fn localhost_scope_is_enforced() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let mut local = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut remote = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/localhost/api"), local.id, 10);

    // a /localhost Interest from a non-local face is dropped
    fw.handle_packet(remote.id, Packet::Interest(Interest::new(name("/localhost/api/op")).with_nonce(1)));
    assert_quiet(&mut local);
    assert_quiet(&mut remote);
    assert_eq!(fw.pit.len(), 0);

    // the same Interest from a local face proceeds
    fw.handle_packet(local.id, Packet::Interest(Interest::new(name("/localhost/api/op")).with_nonce(2)));
    assert_eq!(fw.pit.len(), 1);
}

#[test]
fn unsolicited_data_policy_controls_caching() {
    let mut fw = Forwarder::new(ForwarderOptions {
        unsolicited_policy: UnsolicitedDataPolicy::CacheAll,
        ..ForwarderOptions::default()
    });
    let producer = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);

    fw.handle_packet(producer.id, Packet::Data(Data::new(name("/stray"), "x")));
    assert_eq!(fw.metrics.n_unsolicited_data.value(), 1);
    assert_eq!(fw.cs.len(), 1);
}

#[test]
fn face_removal_cleans_tables() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut producer = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/example"), producer.id, 10);

    let reflexive = Interest::new(Name::from_uri_reflexive("/example/app/1").unwrap())
        .with_nonce(1)
        .with_pit_token(9);
    fw.handle_packet(consumer.id, Packet::Interest(reflexive));
    recv_interest(&mut producer);
    assert_eq!(fw.pit.len(), 1);
    assert_eq!(fw.pit_assist.len(), 1);

    // removing the producer deletes its out-record; the entry survives on
    // the consumer's in-record
    fw.remove_face(producer.id);
    assert_eq!(fw.pit.len(), 1);
    assert!(fw.fib_entries().is_empty());

    // removing the consumer leaves the entry recordless; it is erased
    // together with its token row
    fw.remove_face(consumer.id);
    assert_eq!(fw.pit.len(), 0);
    assert!(fw.pit_assist.is_empty());
}

/// A multicast choice forwards to every eligible nexthop.
#[test]
fn multicast_strategy_fans_out() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut up1 = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    let mut up2 = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/bcast"), up1.id, 10);
    fw.register_route(&name("/bcast"), up2.id, 20);
    fw.set_strategy(&name("/bcast"), &name("/localhost/rnfd/strategy/multicast"))
        .unwrap();

    fw.handle_packet(consumer.id, Packet::Interest(Interest::new(name("/bcast/x")).with_nonce(1)));
    assert_eq!(recv_interest(&mut up1).name, name("/bcast/x"));
    assert_eq!(recv_interest(&mut up2).name, name("/bcast/x"));
    assert_eq!(fw.metrics.n_out_interests.value(), 2);
}

/// A new FIB nexthop triggers forwarding of pending Interests under a
/// multicast prefix.
#[test]
fn new_nexthop_forwards_pending_interests() {
    let mut fw = Forwarder::new(ForwarderOptions::default());
    let consumer = add_face(&mut fw, FaceScope::Local, LinkType::PointToPoint);
    let mut up1 = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    let mut up2 = add_face(&mut fw, FaceScope::NonLocal, LinkType::PointToPoint);
    fw.register_route(&name("/bcast"), up1.id, 10);
    fw.set_strategy(&name("/bcast"), &name("/localhost/rnfd/strategy/multicast"))
        .unwrap();

    fw.handle_packet(consumer.id, Packet::Interest(Interest::new(name("/bcast/x")).with_nonce(1)));
    recv_interest(&mut up1);

    fw.register_route(&name("/bcast"), up2.id, 20);
    assert_eq!(recv_interest(&mut up2).name, name("/bcast/x"));
}
