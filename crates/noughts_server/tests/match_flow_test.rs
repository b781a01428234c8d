//! Tests for session, match and registry behaviour without sockets.

use noughts_server::{
    AuthState, ConnectionId, DRAW, Operation, Outbox, PlayerToken, Position, Registry, Request,
    Response,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// One in-memory connection.
struct Client {
    id: ConnectionId,
    rx: UnboundedReceiver<Response>,
    token: Option<PlayerToken>,
}

impl Client {
    fn connect(registry: &Registry, n: u64) -> Self {
        let id = ConnectionId::new(n);
        let (outbox, rx) = Outbox::channel(id);
        registry.connect(outbox);
        Self { id, rx, token: None }
    }

    /// Connects and authenticates with a generated token.
    fn login(registry: &Registry, n: u64) -> Self {
        let mut client = Self::connect(registry, n);
        client.send(registry, Request::Authenticate { player_token: None });
        match client.drain().as_slice() {
            [Response::Auth { player_token }] => client.token = Some(*player_token),
            other => panic!("Unexpected auth reply: {:?}", other),
        }
        client
    }

    fn token(&self) -> PlayerToken {
        self.token.expect("Client not logged in")
    }

    fn send(&self, registry: &Registry, request: Request) {
        registry.handle(self.id, request);
    }

    fn drain(&mut self) -> Vec<Response> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    fn place(&self, registry: &Registry, match_id: i32, x: i32, y: i32) {
        self.send(
            registry,
            Request::PlaceMark {
                match_id,
                position: Some(Position { x, y }),
            },
        );
    }
}

fn is_error(responses: &[Response]) -> bool {
    matches!(responses, [Response::Error { .. }])
}

/// Host creates `match_id`, guest joins it; both outboxes are drained.
fn seated_pair(registry: &Registry, match_id: i32) -> (Client, Client) {
    let mut host = Client::login(registry, 1);
    let mut guest = Client::login(registry, 2);
    host.send(registry, Request::CreateMatch { match_id });
    guest.send(registry, Request::JoinMatch { match_id });
    host.drain();
    guest.drain();
    (host, guest)
}

/// Host wins the top row.
fn play_host_win(registry: &Registry, host: &Client, guest: &Client, match_id: i32) {
    host.place(registry, match_id, 1, 1);
    guest.place(registry, match_id, 2, 1);
    host.place(registry, match_id, 1, 2);
    guest.place(registry, match_id, 2, 2);
    host.place(registry, match_id, 1, 3);
}

#[test]
fn test_requests_before_auth_are_unauthorized() {
    let registry = Registry::new();
    let mut client = Client::connect(&registry, 1);

    for request in [
        Request::CreateMatch { match_id: 1 },
        Request::JoinMatch { match_id: 1 },
        Request::Sync,
        Request::GetStatistics,
    ] {
        client.send(&registry, request);
        assert_eq!(
            client.drain(),
            vec![Response::Error {
                message: "Not authenticated".to_string()
            }]
        );
    }
    assert_eq!(registry.auth_state(client.id), AuthState::Unauthenticated);
    assert!(!registry.contains_match(1));
}

#[test]
fn test_authenticate_with_supplied_token() {
    let registry = Registry::new();
    let mut client = Client::connect(&registry, 1);
    let token = PlayerToken::generate();

    client.send(
        &registry,
        Request::Authenticate {
            player_token: Some(token.to_string()),
        },
    );
    assert_eq!(
        client.drain(),
        vec![Response::Auth {
            player_token: token
        }]
    );
    assert_eq!(registry.auth_state(client.id), AuthState::Idle);
}

#[test]
fn test_malformed_token_leaves_connection_unauthenticated() {
    let registry = Registry::new();
    let mut client = Client::connect(&registry, 1);
    client.send(
        &registry,
        Request::Authenticate {
            player_token: Some("definitely not a uuid".to_string()),
        },
    );
    assert!(is_error(&client.drain()));
    assert_eq!(registry.auth_state(client.id), AuthState::Unauthenticated);
    assert_eq!(registry.session_count(), 0);
}

#[test]
fn test_create_and_join_notices() {
    let registry = Registry::new();
    let mut host = Client::login(&registry, 1);
    let mut guest = Client::login(&registry, 2);

    host.send(&registry, Request::CreateMatch { match_id: 7 });
    assert_eq!(
        host.drain(),
        vec![Response::MatchOperation {
            match_id: 7,
            operation: Operation::Create,
            host_token: Some(host.token()),
            guest_token: None,
        }]
    );
    assert_eq!(registry.auth_state(host.id), AuthState::InMatch);

    guest.send(&registry, Request::JoinMatch { match_id: 7 });
    let joined = Response::MatchOperation {
        match_id: 7,
        operation: Operation::Join,
        host_token: Some(host.token()),
        guest_token: Some(guest.token()),
    };
    assert_eq!(host.drain(), vec![joined.clone()]);
    assert_eq!(guest.drain(), vec![joined]);
    assert_eq!(registry.auth_state(guest.id), AuthState::InMatch);
}

#[test]
fn test_join_unknown_match_not_found() {
    let registry = Registry::new();
    let mut guest = Client::login(&registry, 2);
    guest.send(&registry, Request::JoinMatch { match_id: 99 });
    assert_eq!(
        guest.drain(),
        vec![Response::Error {
            message: "Match 99 not found".to_string()
        }]
    );
    assert_eq!(registry.auth_state(guest.id), AuthState::Idle);
}

#[test]
fn test_create_or_join_while_in_match_rejected() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    host.send(&registry, Request::CreateMatch { match_id: 8 });
    assert!(is_error(&host.drain()));
    assert!(!registry.contains_match(8));

    guest.send(&registry, Request::JoinMatch { match_id: 7 });
    assert_eq!(
        guest.drain(),
        vec![Response::Error {
            message: "Already in a match".to_string()
        }]
    );
}

#[test]
fn test_create_with_live_id_rejected() {
    let registry = Registry::new();
    let mut first = Client::login(&registry, 1);
    let mut second = Client::login(&registry, 2);
    first.send(&registry, Request::CreateMatch { match_id: 7 });
    first.drain();

    second.send(&registry, Request::CreateMatch { match_id: 7 });
    assert!(is_error(&second.drain()));
    assert_eq!(registry.auth_state(second.id), AuthState::Idle);

    // The original match still belongs to the first host.
    let mut third = Client::login(&registry, 3);
    third.send(&registry, Request::JoinMatch { match_id: 7 });
    third.drain();
    let notices = first.drain();
    assert!(matches!(
        notices.as_slice(),
        [Response::MatchOperation {
            operation: Operation::Join,
            ..
        }]
    ));
}

#[test]
fn test_occupied_cell_then_valid_move() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    host.place(&registry, 7, 1, 1);
    assert_eq!(
        host.drain(),
        vec![Response::Placement {
            is_mine: true,
            x: 1,
            y: 1
        }]
    );
    assert_eq!(
        guest.drain(),
        vec![Response::Placement {
            is_mine: false,
            x: 1,
            y: 1
        }]
    );

    guest.place(&registry, 7, 1, 1);
    assert!(is_error(&guest.drain()));
    assert!(host.drain().is_empty());

    guest.place(&registry, 7, 2, 2);
    assert_eq!(
        guest.drain(),
        vec![Response::Placement {
            is_mine: true,
            x: 2,
            y: 2
        }]
    );
    assert_eq!(
        host.drain(),
        vec![Response::Placement {
            is_mine: false,
            x: 2,
            y: 2
        }]
    );
}

#[test]
fn test_same_player_cannot_move_twice() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    host.place(&registry, 7, 1, 1);
    host.place(&registry, 7, 1, 2);
    host.place(&registry, 7, 1, 3);

    let replies = host.drain();
    assert_eq!(replies.len(), 3);
    assert!(matches!(replies[0], Response::Placement { is_mine: true, .. }));
    assert!(matches!(replies[1], Response::Error { .. }));
    assert!(matches!(replies[2], Response::Error { .. }));
    assert_eq!(guest.drain().len(), 1);

    guest.send(&registry, Request::Sync);
    assert_eq!(
        guest.drain(),
        vec![Response::Placement {
            is_mine: false,
            x: 1,
            y: 1
        }]
    );
}

#[test]
fn test_placement_needs_opponent() {
    let registry = Registry::new();
    let mut host = Client::login(&registry, 1);
    host.send(&registry, Request::CreateMatch { match_id: 3 });
    host.drain();

    host.place(&registry, 3, 2, 2);
    assert_eq!(
        host.drain(),
        vec![Response::Error {
            message: "Waiting for an opponent".to_string()
        }]
    );
}

#[test]
fn test_invalid_positions_are_reported_without_mutation() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    host.send(
        &registry,
        Request::PlaceMark {
            match_id: 7,
            position: None,
        },
    );
    assert!(is_error(&host.drain()));

    host.place(&registry, 7, 0, 4);
    assert!(is_error(&host.drain()));

    host.send(&registry, Request::Sync);
    assert!(host.drain().is_empty());
    assert!(guest.drain().is_empty());
}

#[test]
fn test_win_finishes_and_blocks_further_moves() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    play_host_win(&registry, &host, &guest, 7);
    let finish = Response::Finish {
        outcome: Some(host.token().to_string()),
    };
    assert_eq!(host.drain().last(), Some(&finish));
    assert_eq!(guest.drain().last(), Some(&finish));

    guest.place(&registry, 7, 3, 3);
    assert!(is_error(&guest.drain()));
    assert!(host.drain().is_empty());
}

#[test]
fn test_reset_scores_win_and_loser_opens() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);
    play_host_win(&registry, &host, &guest, 7);
    host.drain();
    guest.drain();

    guest.send(&registry, Request::ResetMatch { match_id: 7 });
    let reset = Response::MatchOperation {
        match_id: 7,
        operation: Operation::Reset,
        host_token: Some(host.token()),
        guest_token: Some(guest.token()),
    };
    assert_eq!(host.drain(), vec![reset.clone()]);
    assert_eq!(guest.drain(), vec![reset]);

    host.send(&registry, Request::GetStatistics);
    assert_eq!(
        host.drain(),
        vec![
            Response::Statistics {
                wins: 1,
                losses: 0,
                is_mine: true
            },
            Response::Statistics {
                wins: 0,
                losses: 1,
                is_mine: false
            },
        ]
    );

    // Board is clear and the loser opens.
    host.send(&registry, Request::Sync);
    assert!(host.drain().is_empty());
    host.place(&registry, 7, 2, 2);
    assert!(is_error(&host.drain()));
    guest.place(&registry, 7, 2, 2);
    assert!(matches!(
        guest.drain().as_slice(),
        [Response::Placement { is_mine: true, .. }]
    ));
}

#[test]
fn test_draw_then_reset_keeps_score() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    // O X O / O X X / X O O
    for (client, x, y) in [
        (&host, 1, 1),
        (&guest, 1, 2),
        (&host, 1, 3),
        (&guest, 2, 2),
        (&host, 2, 1),
        (&guest, 3, 1),
        (&host, 3, 2),
        (&guest, 2, 3),
        (&host, 3, 3),
    ] {
        client.place(&registry, 7, x, y);
    }
    let draw = Response::Finish {
        outcome: Some(DRAW.to_string()),
    };
    assert_eq!(host.drain().last(), Some(&draw));
    assert_eq!(guest.drain().last(), Some(&draw));

    host.send(&registry, Request::ResetMatch { match_id: 7 });
    host.drain();
    guest.drain();

    guest.send(&registry, Request::GetStatistics);
    assert_eq!(
        guest.drain(),
        vec![
            Response::Statistics {
                wins: 0,
                losses: 0,
                is_mine: true
            },
            Response::Statistics {
                wins: 0,
                losses: 0,
                is_mine: false
            },
        ]
    );
    guest.send(&registry, Request::Sync);
    assert!(guest.drain().is_empty());

    // Host made the last mark of the drawn round, so the guest opens.
    guest.place(&registry, 7, 1, 1);
    assert!(matches!(
        guest.drain().as_slice(),
        [Response::Placement { is_mine: true, .. }]
    ));
}

#[test]
fn test_sync_is_idempotent_and_row_major() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);
    host.place(&registry, 7, 3, 3);
    guest.place(&registry, 7, 1, 2);
    host.place(&registry, 7, 2, 1);
    host.drain();
    guest.drain();

    guest.send(&registry, Request::Sync);
    let first = guest.drain();
    guest.send(&registry, Request::Sync);
    let second = guest.drain();

    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            Response::Placement {
                is_mine: true,
                x: 1,
                y: 2
            },
            Response::Placement {
                is_mine: false,
                x: 2,
                y: 1
            },
            Response::Placement {
                is_mine: false,
                x: 3,
                y: 3
            },
        ]
    );
    assert!(host.drain().is_empty());
}

#[test]
fn test_sync_and_leave_require_match() {
    let registry = Registry::new();
    let mut idle = Client::login(&registry, 1);

    idle.send(&registry, Request::Sync);
    assert_eq!(
        idle.drain(),
        vec![Response::Error {
            message: "Not in a match".to_string()
        }]
    );
    idle.send(&registry, Request::LeaveMatch { match_id: 1 });
    assert!(is_error(&idle.drain()));
    idle.send(&registry, Request::ResetMatch { match_id: 1 });
    assert!(is_error(&idle.drain()));
}

#[test]
fn test_statistics_while_idle_is_domain_error() {
    let registry = Registry::new();
    let mut idle = Client::login(&registry, 1);
    idle.send(&registry, Request::GetStatistics);
    assert!(is_error(&idle.drain()));
}

#[test]
fn test_host_leave_ends_match_for_guest() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);

    host.send(&registry, Request::LeaveMatch { match_id: 7 });
    assert_eq!(host.drain(), vec![Response::Finish { outcome: None }]);
    assert_eq!(guest.drain(), vec![Response::Finish { outcome: None }]);
    assert_eq!(registry.auth_state(host.id), AuthState::Idle);
    assert_eq!(registry.auth_state(guest.id), AuthState::Idle);
    assert!(!registry.contains_match(7));

    let mut late = Client::login(&registry, 3);
    late.send(&registry, Request::JoinMatch { match_id: 7 });
    assert!(is_error(&late.drain()));

    // Both former players are free to start over.
    guest.send(&registry, Request::CreateMatch { match_id: 7 });
    assert!(matches!(
        guest.drain().as_slice(),
        [Response::MatchOperation {
            operation: Operation::Create,
            ..
        }]
    ));
}

#[test]
fn test_guest_leave_keeps_match_open() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);
    host.place(&registry, 7, 1, 1);
    host.drain();
    guest.drain();

    guest.send(&registry, Request::LeaveMatch { match_id: 7 });
    assert_eq!(guest.drain(), vec![Response::Finish { outcome: None }]);
    assert_eq!(
        host.drain(),
        vec![Response::MatchOperation {
            match_id: 7,
            operation: Operation::Leave,
            host_token: Some(host.token()),
            guest_token: Some(guest.token()),
        }]
    );
    assert_eq!(registry.auth_state(guest.id), AuthState::Idle);
    assert_eq!(registry.auth_state(host.id), AuthState::InMatch);
    assert!(registry.contains_match(7));

    let mut newcomer = Client::login(&registry, 3);
    newcomer.send(&registry, Request::JoinMatch { match_id: 7 });
    assert!(matches!(
        newcomer.drain().as_slice(),
        [Response::MatchOperation {
            operation: Operation::Join,
            ..
        }]
    ));

    // The board survives the change of guest.
    newcomer.send(&registry, Request::Sync);
    assert_eq!(
        newcomer.drain(),
        vec![Response::Placement {
            is_mine: false,
            x: 1,
            y: 1
        }]
    );
}

#[test]
fn test_disconnects_release_roles() {
    let registry = Registry::new();
    let (mut host, guest) = seated_pair(&registry, 7);

    registry.disconnect(guest.id);
    assert!(matches!(
        host.drain().as_slice(),
        [Response::MatchOperation {
            operation: Operation::Leave,
            ..
        }]
    ));
    assert!(registry.contains_match(7));
    assert_eq!(registry.auth_state(guest.id), AuthState::Unauthenticated);

    let mut second = Client::login(&registry, 3);
    second.send(&registry, Request::JoinMatch { match_id: 7 });
    second.drain();
    host.drain();

    registry.disconnect(host.id);
    assert_eq!(second.drain(), vec![Response::Finish { outcome: None }]);
    assert_eq!(registry.auth_state(second.id), AuthState::Idle);
    assert!(!registry.contains_match(7));
}

#[test]
fn test_reauthentication_displaces_hosted_match() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);
    let old_token = host.token();

    host.send(&registry, Request::Authenticate { player_token: None });
    let replies = host.drain();
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0], Response::Finish { outcome: None });
    assert_eq!(
        replies[1],
        Response::MatchOperation {
            match_id: 7,
            operation: Operation::Leave,
            host_token: Some(old_token),
            guest_token: None,
        }
    );
    assert!(matches!(replies[2], Response::Auth { player_token } if player_token != old_token));

    assert_eq!(guest.drain(), vec![Response::Finish { outcome: None }]);
    assert_eq!(registry.auth_state(host.id), AuthState::Idle);
    assert_eq!(registry.auth_state(guest.id), AuthState::Idle);
    assert!(!registry.contains_match(7));
}

#[test]
fn test_reauthentication_frees_guest_seat() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);
    let old_token = guest.token();

    guest.send(&registry, Request::Authenticate { player_token: None });
    let replies = guest.drain();
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0], Response::Finish { outcome: None });
    assert_eq!(
        replies[1],
        Response::MatchOperation {
            match_id: 7,
            operation: Operation::Leave,
            host_token: None,
            guest_token: Some(old_token),
        }
    );
    let Response::Auth { player_token } = &replies[2] else {
        panic!("Expected auth confirmation, got {:?}", replies[2]);
    };
    let player_token = *player_token;
    assert_ne!(player_token, old_token);

    assert_eq!(
        host.drain(),
        vec![Response::MatchOperation {
            match_id: 7,
            operation: Operation::Leave,
            host_token: Some(host.token()),
            guest_token: Some(old_token),
        }]
    );
    assert!(registry.contains_match(7));
    assert_eq!(registry.auth_state(host.id), AuthState::InMatch);
    assert_eq!(registry.auth_state(guest.id), AuthState::Idle);

    // The connection no longer plays as guest.
    guest.place(&registry, 7, 2, 2);
    assert!(is_error(&guest.drain()));
    host.place(&registry, 7, 2, 2);
    assert!(is_error(&host.drain()));

    // The seat is free for anyone, including the new session.
    guest.send(&registry, Request::JoinMatch { match_id: 7 });
    assert_eq!(
        guest.drain(),
        vec![Response::MatchOperation {
            match_id: 7,
            operation: Operation::Join,
            host_token: Some(host.token()),
            guest_token: Some(player_token),
        }]
    );
    assert_eq!(registry.auth_state(guest.id), AuthState::InMatch);
}

#[test]
fn test_reset_without_guest_scores_nothing() {
    let registry = Registry::new();
    let (mut host, mut guest) = seated_pair(&registry, 7);
    guest.place(&registry, 7, 1, 1);
    host.place(&registry, 7, 2, 1);
    guest.place(&registry, 7, 1, 2);
    host.place(&registry, 7, 2, 2);
    guest.place(&registry, 7, 1, 3);
    host.drain();
    guest.drain();

    guest.send(&registry, Request::LeaveMatch { match_id: 7 });
    assert_eq!(
        guest.drain(),
        vec![Response::Finish {
            outcome: Some(guest.token().to_string())
        }]
    );
    host.drain();

    host.send(&registry, Request::ResetMatch { match_id: 7 });
    assert_eq!(
        host.drain(),
        vec![Response::MatchOperation {
            match_id: 7,
            operation: Operation::Reset,
            host_token: Some(host.token()),
            guest_token: None,
        }]
    );
    host.send(&registry, Request::GetStatistics);
    assert_eq!(
        host.drain(),
        vec![Response::Statistics {
            wins: 0,
            losses: 0,
            is_mine: true
        }]
    );

    let mut newcomer = Client::login(&registry, 3);
    newcomer.send(&registry, Request::JoinMatch { match_id: 7 });
    newcomer.drain();
    newcomer.send(&registry, Request::Sync);
    assert!(newcomer.drain().is_empty());
    newcomer.send(&registry, Request::GetStatistics);
    assert_eq!(
        newcomer.drain(),
        vec![
            Response::Statistics {
                wins: 0,
                losses: 0,
                is_mine: true
            },
            Response::Statistics {
                wins: 0,
                losses: 0,
                is_mine: false
            },
        ]
    );
}

#[test]
fn test_concurrent_joins_seat_one_guest() {
    let registry = Registry::new();
    let mut host = Client::login(&registry, 1);
    host.send(&registry, Request::CreateMatch { match_id: 5 });
    host.drain();

    let mut contenders: Vec<Client> = (10..18).map(|n| Client::login(&registry, n)).collect();
    std::thread::scope(|scope| {
        for contender in &contenders {
            let registry = registry.clone();
            let id = contender.id;
            scope.spawn(move || registry.handle(id, Request::JoinMatch { match_id: 5 }));
        }
    });

    let seated = contenders
        .iter_mut()
        .map(|c| c.drain())
        .filter(|drained| {
            matches!(
                drained.as_slice(),
                [Response::MatchOperation {
                    operation: Operation::Join,
                    ..
                }]
            )
        })
        .count();
    assert_eq!(seated, 1);
    assert_eq!(
        contenders
            .iter()
            .filter(|c| registry.auth_state(c.id) == AuthState::InMatch)
            .count(),
        1
    );
    assert_eq!(host.drain().len(), 1);
}
