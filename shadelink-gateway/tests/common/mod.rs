pub mod mock_gateway;
