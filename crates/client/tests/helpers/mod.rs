pub mod mock_nameserver;
